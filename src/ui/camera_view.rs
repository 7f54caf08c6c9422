use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, CameraAccessError, CameraDevice,
    CameraState, Context, Fatal, FluentBuilder, IntoElement, ParentElement, Screen, SharedString,
    Styled, StyledExt, div, h_flex, pipeline, px, v_flex,
};

pub(super) enum CameraChoice {
    Use(CameraDevice),
    Ask(Vec<CameraDevice>),
}

pub(super) fn initial_camera_choice(
    requested: Option<usize>,
) -> Result<CameraChoice, CameraAccessError> {
    let mut cameras = pipeline::available_cameras()?;
    if cameras.is_empty() {
        return Err(CameraAccessError::NoCamera);
    }

    match requested {
        Some(idx) if idx < cameras.len() => Ok(CameraChoice::Use(cameras.swap_remove(idx))),
        Some(idx) => Err(CameraAccessError::Open(format!(
            "camera #{idx} requested but only {} detected",
            cameras.len()
        ))),
        None if cameras.len() == 1 => Ok(CameraChoice::Use(cameras.remove(0))),
        None => Ok(CameraChoice::Ask(cameras)),
    }
}

impl AppView {
    pub(super) fn render_camera_picker(
        &mut self,
        state: &CameraState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let mut picker = v_flex()
            .gap_2()
            .p_4()
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg()
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(gpui::rgb(0xe2e8f0))
                    .mb_2()
                    .child("Choose a camera"),
            );

        for (idx, device) in state.options.iter().enumerate() {
            let button = Button::new(SharedString::from(format!("camera-{idx}")))
                .label(device.label.clone())
                .w_full()
                .on_click(cx.listener(move |this, _, _, cx| {
                    this.select_camera(idx);
                    cx.notify();
                }));
            picker = picker.child(if idx == state.selected {
                button.primary()
            } else {
                button.outline()
            });
        }

        picker = picker.child(
            Button::new(SharedString::from("camera-confirm"))
                .primary()
                .label("✓ Start streaming")
                .w_full()
                .mt_2()
                .on_click(cx.listener(|this, _, _, cx| {
                    this.start_selected_camera();
                    cx.notify();
                })),
        );

        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::rgb(0x1a2332))
            .child(div().w(px(420.0)).child(picker))
            .into_any_element()
    }

    pub(super) fn render_fatal(&mut self, fatal: &Fatal, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let message = fatal.message();
        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .bg(gpui::rgb(0x1a2332))
            .child(
                v_flex()
                    .w(px(480.0))
                    .gap_2()
                    .p_4()
                    .rounded_lg()
                    .bg(gpui::rgba(0x7f1d1d33))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444aa))
                    .child(
                        h_flex()
                            .gap_2()
                            .child(div().text_base().child("⚠"))
                            .child(
                                div()
                                    .text_sm()
                                    .font_semibold()
                                    .text_color(gpui::rgb(0xfca5a5))
                                    .child("Cannot start gesture control"),
                            ),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(fatal.hint()),
                    )
                    .when(!message.is_empty(), |this| {
                        this.child(
                            div()
                                .text_xs()
                                .text_color(gpui::rgb(0xfca5a5))
                                .child(message.to_string()),
                        )
                    }),
            )
            .into_any_element()
    }

    fn select_camera(&mut self, idx: usize) {
        if let Screen::Camera(state) = &mut self.screen {
            if idx < state.options.len() {
                state.selected = idx;
            }
        }
    }

    fn start_selected_camera(&mut self) {
        let device = match &self.screen {
            Screen::Camera(state) => state.options.get(state.selected).cloned(),
            _ => None,
        };
        match device {
            Some(device) => self.start_pipeline(&device),
            None => self.screen = CameraAccessError::NoCamera.into(),
        }
    }
}
