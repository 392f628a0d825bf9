mod events;
mod guilds;
mod handlers;
mod middleware;
mod routes;
mod tickets;

pub use routes::create_router;
