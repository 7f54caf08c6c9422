use std::sync::Arc;

use super::render_util::frame_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, ConnectionStatus, Context, DEFAULT_PREVIEW_RATIO,
    FluentBuilder, IntoElement, ObjectFit, PREVIEW_MAX_WIDTH, ParentElement, RenderImage, Styled,
    StyledExt, StyledImage, ViewEvent, Window, div, h_flex, img, px, v_flex,
};

impl AppView {
    fn drain_view_events(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        while let Some(event) = self.view_events.take_oldest() {
            match event {
                ViewEvent::Render(update) => {
                    if let Some(frame) = update.image.as_ref() {
                        if frame.height > 0 {
                            self.preview_ratio = frame.width as f32 / frame.height as f32;
                        }
                        if let Some(image) = frame_to_image(frame) {
                            self.replace_latest_image(image, window, cx);
                        }
                    }
                    if update.gesture.is_some() {
                        self.gesture = update.gesture;
                    }
                    // Snapshots replace the previous render wholesale.
                    self.instructions = Some(update.instructions);
                    self.violation = None;
                }
                ViewEvent::Violation(message) => self.violation = Some(message),
                ViewEvent::Disconnected(reason) => {
                    self.connection = ConnectionStatus::Disconnected(reason);
                }
            }
        }
    }

    pub(super) fn render_dashboard(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.drain_view_events(window, cx);

        let ratio = if self.preview_ratio.is_finite() && self.preview_ratio > 0.0 {
            self.preview_ratio
        } else {
            DEFAULT_PREVIEW_RATIO
        };
        let preview_height = PREVIEW_MAX_WIDTH / ratio;

        let preview: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .rounded_lg()
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for the gesture service...")
                .into_any_element()
        };

        let theme = cx.theme();
        let (camera_color, camera_text) = match &self.camera_label {
            Some(label) => (theme.success, format!("● {label}")),
            None => (theme.muted_foreground, "○ no camera".to_string()),
        };
        let (link_color, link_text) = match &self.connection {
            ConnectionStatus::Connecting => (theme.muted_foreground, "◌ connecting".to_string()),
            ConnectionStatus::Connected => (theme.success, "● connected".to_string()),
            ConnectionStatus::Disconnected(reason) => {
                (theme.danger, format!("○ disconnected: {reason}"))
            }
        };
        let muted = theme.muted_foreground;

        let mode_label = self
            .instructions
            .as_ref()
            .map(|instructions| instructions.mode_label)
            .unwrap_or("-");
        let finger_count = self
            .gesture
            .as_ref()
            .map(|gesture| gesture.finger_count.to_string())
            .unwrap_or_else(|| "-".to_string());
        let gesture_label = self
            .gesture
            .as_ref()
            .map(|gesture| gesture.gesture_label().to_string())
            .unwrap_or_else(|| "-".to_string());

        let header = h_flex()
            .w_full()
            .justify_between()
            .items_center()
            .px_4()
            .py_2()
            .child(
                div()
                    .text_base()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .child("Gesture Home"),
            )
            .child(
                h_flex()
                    .gap_3()
                    .child(status_badge(camera_color, camera_text))
                    .child(status_badge(link_color, link_text)),
            );

        let summary = v_flex()
            .gap_1()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .child(labelled_value("Mode", mode_label.to_string(), muted))
            .child(labelled_value("Fingers", finger_count, muted))
            .child(labelled_value("Gesture", gesture_label, muted));

        let violation = self.violation.clone();
        let devices = self.render_devices(self.instructions.as_ref(), cx);

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(header)
            .child(
                h_flex()
                    .flex_1()
                    .gap_4()
                    .p_4()
                    .items_start()
                    .child(
                        div()
                            .w(px(PREVIEW_MAX_WIDTH))
                            .h(px(preview_height))
                            .overflow_hidden()
                            .rounded_lg()
                            .bg(gpui::rgb(0x000000))
                            .child(preview),
                    )
                    .child(
                        v_flex()
                            .flex_1()
                            .gap_3()
                            .child(summary)
                            .when_some(violation, |this, message| {
                                this.child(
                                    div()
                                        .p_2()
                                        .rounded_lg()
                                        .bg(gpui::rgba(0xef444433))
                                        .border_1()
                                        .border_color(gpui::rgba(0xef4444ff))
                                        .text_xs()
                                        .text_color(gpui::rgb(0xfca5a5))
                                        .child(format!("Update rejected: {message}")),
                                )
                            })
                            .child(devices),
                    ),
            )
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every frame unless the old texture is dropped.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn status_badge(color: gpui::Hsla, text: String) -> impl IntoElement {
    div()
        .px_2()
        .py_0p5()
        .rounded_md()
        .bg(gpui::rgba(0x00000033))
        .text_xs()
        .text_color(color)
        .child(text)
}

fn labelled_value(caption: &'static str, value: String, muted: gpui::Hsla) -> impl IntoElement {
    h_flex()
        .justify_between()
        .child(div().text_xs().text_color(muted).child(caption))
        .child(
            div()
                .text_sm()
                .text_color(gpui::rgb(0xe2e8f0))
                .child(value),
        )
}
