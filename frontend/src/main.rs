mod components;

use components::{header, results, tips, upload_section, utils};
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_net::http::Request;
use shared::{AnalysisResponse, ErrorResponse};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

struct SelectedFile {
    file: GlooFile,
    preview_url: ObjectUrl,
}

enum Msg {
    FileSelected(GlooFile),
    ClearFile,
    Analyze,
    AnalysisResult(AnalysisResponse),
    SetError(Option<String>),
    SetDragging(bool),
    HandleDrop(DragEvent),
}

struct Model {
    selected: Option<SelectedFile>,
    result: Option<AnalysisResponse>,
    loading: bool,
    error: Option<String>,
    is_dragging: bool,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            selected: None,
            result: None,
            loading: false,
            error: None,
            is_dragging: false,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::FileSelected(file) => {
                let preview_url = ObjectUrl::from(file.clone());
                self.selected = Some(SelectedFile { file, preview_url });
                self.result = None;
                self.error = None;
                true
            }
            Msg::ClearFile => {
                self.selected = None;
                self.result = None;
                self.error = None;
                true
            }
            Msg::Analyze => self.handle_analyze(ctx),
            Msg::AnalysisResult(response) => {
                self.result = Some(response);
                self.loading = false;
                true
            }
            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => self.handle_drop(ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { header::render_header() }

                <main class="content-section">
                    <p class="upload-text">{"Upload a clear image of the plant leaf for analysis"}</p>
                    { upload_section::render_upload_section(self, ctx) }
                    { utils::render_error_message(self) }
                    { results::render_results(self) }
                    { tips::render_tips(self) }
                </main>

                <footer class="app-footer">
                    <p>{"Plant Disease Detection | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

impl Model {
    fn handle_analyze(&mut self, ctx: &Context<Self>) -> bool {
        let Some(selected) = &self.selected else {
            ctx.link()
                .send_message(Msg::SetError(Some("Please upload an image first.".into())));
            return false;
        };

        self.loading = true;
        self.error = None;
        self.result = None;
        send_analysis_request(ctx, selected.file.clone());
        true
    }

    fn handle_drop(&mut self, ctx: &Context<Self>, event: DragEvent) -> bool {
        event.prevent_default();
        self.is_dragging = false;

        let file = event
            .data_transfer()
            .and_then(|transfer| transfer.files())
            .and_then(|files| utils::first_accepted_image(&files));
        match file {
            Some(file) => ctx.link().send_message(Msg::FileSelected(file)),
            None => ctx.link().send_message(Msg::SetError(Some(
                "Please drop a JPG or PNG image.".into(),
            ))),
        }
        true
    }
}

fn send_analysis_request(ctx: &Context<Model>, file: GlooFile) {
    spawn_local({
        let link = ctx.link().clone();

        async move {
            let form_data = match web_sys::FormData::new() {
                Ok(form_data) => form_data,
                Err(_) => {
                    link.send_message(Msg::SetError(Some("Could not prepare upload.".into())));
                    return;
                }
            };
            if form_data
                .append_with_blob_and_filename("image", file.as_ref(), &file.name())
                .is_err()
            {
                link.send_message(Msg::SetError(Some("Could not attach image.".into())));
                return;
            }

            let request = match Request::post("/api/analyze").body(form_data) {
                Ok(request) => request,
                Err(e) => {
                    link.send_message(Msg::SetError(Some(format!("Failed to build request: {}", e))));
                    return;
                }
            };

            match request.send().await {
                Ok(response) if response.ok() => match response.json::<AnalysisResponse>().await {
                    Ok(result) => link.send_message(Msg::AnalysisResult(result)),
                    Err(e) => link.send_message(Msg::SetError(Some(format!(
                        "Failed to parse response: {}",
                        e
                    )))),
                },
                Ok(response) => {
                    let status = response.status();
                    let message = match response.json::<ErrorResponse>().await {
                        Ok(body) => match body.detail {
                            Some(detail) => format!("{} ({})", body.error, detail),
                            None => body.error,
                        },
                        Err(_) => format!("Server error: {}", status),
                    };
                    log::warn!("Analysis failed with status {}: {}", status, message);
                    link.send_message(Msg::SetError(Some(message)))
                }
                Err(e) => link.send_message(Msg::SetError(Some(format!("Network error: {}", e)))),
            }
        }
    });
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<Model>::new().render();
}
