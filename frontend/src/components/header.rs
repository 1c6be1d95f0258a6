use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="header">
            <h1>{"🌿 Plant Disease Detection"}</h1>
        </header>
    }
}
