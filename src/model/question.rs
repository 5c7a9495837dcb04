use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const YES: &str = "YES";
pub const NO: &str = "NO";

/// A multiple-choice option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub number: u32,
    pub option: String,
    /// Created by the YES/NO management rather than by an administrator.
    #[serde(default)]
    pub auto: bool,
}

/// An entry of a ranked question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOrder {
    pub number: u32,
    pub option: String,
    pub order_number: Option<u32>,
}

/// The question a voting asks. It holds either options or orders, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub desc: String,
    #[serde(default)]
    pub is_yes_no: bool,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub orders: Vec<QuestionOrder>,
}

/// Changes an administrator may make to the question itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionUpdate {
    pub desc: Option<String>,
    pub is_yes_no: Option<bool>,
}

impl Question {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            is_yes_no: false,
            options: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Build a question from plain lists of option and order texts, numbering
    /// them in the given order.
    pub fn from_lists(
        desc: impl Into<String>,
        options: Vec<String>,
        orders: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if !options.is_empty() && !orders.is_empty() {
            return Err(ValidationError::MixedOptionKinds);
        }
        let mut question = Self::new(desc);
        for option in options {
            question.add_option(option, None)?;
        }
        for (i, order) in orders.into_iter().enumerate() {
            question.add_order(order, None, Some(i as u32 + 1))?;
        }
        Ok(question)
    }

    /// Every choice a voter can make, as `(number, text)`, ordered by number.
    pub fn choices(&self) -> Vec<(u32, &str)> {
        let mut choices = self
            .options
            .iter()
            .map(|o| (o.number, o.option.as_str()))
            .chain(self.orders.iter().map(|o| (o.number, o.option.as_str())))
            .collect::<Vec<_>>();
        choices.sort_by_key(|(number, _)| *number);
        choices
    }

    pub fn contains(&self, number: u32) -> bool {
        self.options.iter().any(|o| o.number == number)
            || self.orders.iter().any(|o| o.number == number)
    }

    /// First free number, one past the highest in use.
    fn next_number(&self) -> u32 {
        self.options
            .iter()
            .map(|o| o.number)
            .chain(self.orders.iter().map(|o| o.number))
            .max()
            .map_or(1, |max| max + 1)
    }

    fn claim_number(&self, number: Option<u32>) -> Result<u32, ValidationError> {
        match number {
            Some(n) if self.contains(n) => Err(ValidationError::DuplicatedNumber(n)),
            Some(n) => Ok(n),
            None => Ok(self.next_number()),
        }
    }

    /// Add a multiple-choice option, returning its number. A duplicate text
    /// is rejected and leaves the question untouched.
    pub fn add_option(
        &mut self,
        text: impl Into<String>,
        number: Option<u32>,
    ) -> Result<u32, ValidationError> {
        let text = text.into();
        if !self.orders.is_empty() {
            return Err(ValidationError::MixedOptionKinds);
        }
        if self.options.iter().any(|o| o.option == text) {
            return Err(ValidationError::DuplicatedOption(text));
        }
        let number = self.claim_number(number)?;
        self.options.push(QuestionOption {
            number,
            option: text,
            auto: false,
        });
        Ok(number)
    }

    /// Add a ranked entry, returning its number.
    pub fn add_order(
        &mut self,
        text: impl Into<String>,
        number: Option<u32>,
        order_number: Option<u32>,
    ) -> Result<u32, ValidationError> {
        let text = text.into();
        if !self.options.is_empty() {
            return Err(ValidationError::MixedOptionKinds);
        }
        if self.orders.iter().any(|o| o.option == text) {
            return Err(ValidationError::DuplicatedOrder(text));
        }
        let number = self.claim_number(number)?;
        self.orders.push(QuestionOrder {
            number,
            option: text,
            order_number,
        });
        Ok(number)
    }

    /// Remove the option or order with the given number. YES/NO entries can
    /// be removed too; the next [`Question::normalize`] brings them back.
    pub fn remove(&mut self, number: u32) -> Result<(), ValidationError> {
        let before = self.options.len() + self.orders.len();
        self.options.retain(|o| o.number != number);
        self.orders.retain(|o| o.number != number);
        if self.options.len() + self.orders.len() == before {
            return Err(ValidationError::UnknownOption(number));
        }
        Ok(())
    }

    pub fn apply(mut self, update: QuestionUpdate) -> Self {
        if let Some(desc) = update.desc {
            self.desc = desc;
        }
        if let Some(is_yes_no) = update.is_yes_no {
            self.is_yes_no = is_yes_no;
        }
        self
    }

    /// Enforce the question invariants, as done on every save.
    ///
    /// A YES/NO question ends up with exactly `[("YES", 0), ("NO", 1)]`,
    /// whatever was there before. Any other question loses its auto-created
    /// entries and must have unique texts and numbers.
    pub fn normalize(mut self) -> Result<Self, ValidationError> {
        if self.is_yes_no {
            self.options = vec![
                QuestionOption {
                    number: 0,
                    option: YES.to_string(),
                    auto: true,
                },
                QuestionOption {
                    number: 1,
                    option: NO.to_string(),
                    auto: true,
                },
            ];
            self.orders.clear();
        } else {
            self.options.retain(|o| !o.auto);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.options.is_empty() && !self.orders.is_empty() {
            return Err(ValidationError::MixedOptionKinds);
        }

        let mut texts = HashSet::new();
        for option in &self.options {
            if !texts.insert(option.option.as_str()) {
                return Err(ValidationError::DuplicatedOption(option.option.clone()));
            }
        }
        for order in &self.orders {
            if !texts.insert(order.option.as_str()) {
                return Err(ValidationError::DuplicatedOrder(order.option.clone()));
            }
        }

        let mut numbers = HashSet::new();
        for (number, _) in self.choices() {
            if !numbers.insert(number) {
                return Err(ValidationError::DuplicatedNumber(number));
            }
        }
        Ok(())
    }
}
