//! Landing page handler

use axum::{extract::State, response::Html};

use crate::AppState;
use crate::render::LandingPage;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(
        LandingPage {
            feature_names: state.context.feature_names(),
            ..Default::default()
        }
        .render(),
    )
}
