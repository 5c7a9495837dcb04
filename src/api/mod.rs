use rocket::Route;

mod mixnet;
mod store;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(store::routes());
    routes.extend(mixnet::routes());
    routes
}
