use super::super::Model;
use yew::prelude::*;

pub fn render_results(model: &Model) -> Html {
    let Some(result) = &model.result else {
        return html! {};
    };
    let confidence = result.confidence.clamp(0.0, 100.0);

    html! {
        <div class="result-text" title={format!("Predicted class: {}", result.label)}>
            <h3>{"Analysis Results:"}</h3>
            <p>{ format!("Plant Type: {}", result.plant_type) }</p>
            <p>{ format!("Condition: {}", result.condition) }</p>
            <div class="confidence-meter">
                <div class="meter-label">{"Confidence:"}</div>
                <div class="meter">
                    <div class="meter-fill" style={format!("width: {:.1}%", confidence)}></div>
                </div>
                <div class="meter-value">{ format!("{:.1}%", confidence) }</div>
            </div>
            <hr />
            <h4>{"Treatment Recommendations:"}</h4>
            { for result.recommendations.iter().map(|item| html! { <p>{ format!("• {}", item) }</p> }) }
        </div>
    }
}
