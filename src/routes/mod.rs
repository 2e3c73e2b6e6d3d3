pub mod callback_routes;
