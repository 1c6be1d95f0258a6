use super::super::Model;
use yew::prelude::*;

const TIP_ICONS: [&str; 3] = ["💡", "📸", "🔍"];

/// Photo tips shown alongside a finished analysis.
pub fn render_tips(model: &Model) -> Html {
    let Some(result) = &model.result else {
        return html! {};
    };

    html! {
        <div class="content-section tips">
            <h3>{"Tips for Better Results:"}</h3>
            { for result.tips.iter().enumerate().map(|(i, tip)| {
                let icon = TIP_ICONS.get(i).copied().unwrap_or("•");
                html! { <p>{ format!("{} {}", icon, tip) }</p> }
            })}
        </div>
    }
}
