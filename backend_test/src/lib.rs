use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one against a fresh
/// server, inject dependencies, and ensure that the database (if any) is
/// dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::store::Stores`] (the ones the server uses), [`crate::config::Config`]
/// and [`mongodb::Database`]. Tests taking a `Database` run the server on
/// MongoDB stores in a randomly named database; all others use in-memory stores.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, has_db) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let connect = if has_db {
        quote! {
            let db = crate::test_db().await;
            let stores = crate::store::Stores::mongodb(&db).await.unwrap();
            (stores, Some(db))
        }
    } else {
        quote! {
            (crate::store::Stores::memory(), None)
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::store::Stores,
                crate::config::Config,
                Option<mongodb::Database>,
            ) {
                let config = crate::config::Config::example();
                let (stores, db): (crate::store::Stores, Option<mongodb::Database>) = { #connect };
                let rocket = crate::rocket_with(config.clone(), stores.clone()).unwrap();
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();
                (rocket_client, stores, config, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            #[allow(unused_variables)]
            let (rocket_client, stores, config, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let stores_mutex = std::sync::Mutex::new(stores);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let stores = stores_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject
/// unknown parameters. Also reports whether the test wants a database.
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, bool), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(last) = type_path.path.segments.last() {
                    let injected = match last.ident.to_string().as_str() {
                        "Client" => Some(quote! { rocket_client }),
                        "Stores" => Some(quote! { stores.clone() }),
                        "Config" => Some(quote! { config.clone() }),
                        "Database" => Some(quote! { db.clone().unwrap() }),
                        _ => None,
                    };
                    if let Some(injected) = injected {
                        let ident = last.ident.to_string();
                        if seen.contains(&ident) {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one `{ident}`"),
                            ));
                        }
                        seen.push(ident);
                        args.push(injected);
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `stores_ident: Stores`, `config_ident: Config` or `db_ident: Database`",
        ));
    }

    let has_db = seen.iter().any(|ident| ident == "Database");
    Ok((args, has_db))
}
