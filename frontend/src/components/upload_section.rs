use super::super::{Model, Msg};
use super::utils::{debounce, first_accepted_image};
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};
use yew::prelude::*;

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <div class="upload-section">
            { render_file_input_area(model, ctx) }
            { render_preview(model, ctx) }
        </div>
    }
}

fn render_file_input_area(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let handle_change = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input.files().as_ref().and_then(first_accepted_image);

        input.set_value("");

        match file {
            Some(file) => Msg::FileSelected(file),
            None => Msg::SetError(Some("Please choose a JPG or PNG image.".into())),
        }
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });

    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    let handle_drop = link.callback(Msg::HandleDrop);
    let trigger_file_input = Callback::from(|_| {
        let input = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id("file-input"));
        if let Some(input) = input {
            if let Ok(html_input) = input.dyn_into::<web_sys::HtmlElement>() {
                html_input.click();
            }
        }
    });

    html! {
        <>
            <input
                type="file"
                id="file-input"
                accept=".jpg,.jpeg,.png,image/jpeg,image/png"
                style="display: none;"
                onchange={handle_change}
            />

            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                <div class="upload-placeholder">
                    <p>{"Choose an image... or drag & drop it here"}</p>
                    <p class="file-types">{"Supported formats: JPG, JPEG, PNG"}</p>
                </div>
            </div>
        </>
    }
}

fn render_preview(model: &Model, ctx: &Context<Model>) -> Html {
    let Some(selected) = &model.selected else {
        return html! {};
    };
    let link = ctx.link().clone();

    html! {
        <div id="preview-container">
            <img
                id="leaf-preview"
                src={selected.preview_url.to_string()}
                alt="Uploaded Leaf Image"
                width="400"
            />
            <p class="caption">{ format!("Uploaded Leaf Image ({})", selected.file.name()) }</p>
            <div class="button-container">
                <button
                    class="clear-btn"
                    disabled={model.loading}
                    onclick={debounce(300, {
                        let link = link.clone();
                        move || link.send_message(Msg::ClearFile)
                    })}
                >
                    {"Clear"}
                </button>
                <button
                    class="analyze-btn"
                    disabled={model.loading}
                    onclick={debounce(300, {
                        let link = link.clone();
                        move || link.send_message(Msg::Analyze)
                    })}
                >
                    { render_analyze_button_content(model) }
                </button>
            </div>
        </div>
    }
}

fn render_analyze_button_content(model: &Model) -> Html {
    if model.loading {
        html! { <><span class="spinner"></span>{" Analyzing your image..."}</> }
    } else {
        html! { {"🔍 Analyze Leaf"} }
    }
}
