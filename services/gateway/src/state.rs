use token_feed::QueryFacade;

#[derive(Clone)]
pub struct AppState {
    pub feed: QueryFacade,
}

impl AppState {
    pub fn new(feed: QueryFacade) -> Self {
        Self { feed }
    }
}
