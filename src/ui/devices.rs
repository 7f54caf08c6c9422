use super::{
    ActiveTheme, AnyElement, AppView, Context, DEVICE_CARD_WIDTH, FluentBuilder, IntoElement,
    ParentElement, Styled, StyledExt, div, h_flex, px, v_flex,
};
use crate::reconcile::{DeviceRender, RenderInstructions};

const SELECTED_ACCENT: u32 = 0xa5b4fc;

impl AppView {
    pub(super) fn render_devices(
        &self,
        instructions: Option<&RenderInstructions>,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let Some(instructions) = instructions else {
            return div()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for device state...")
                .into_any_element();
        };

        h_flex()
            .flex_wrap()
            .gap_3()
            .children(
                instructions
                    .devices
                    .iter()
                    .map(|device| Self::render_device_card(device, cx)),
            )
            .into_any_element()
    }

    fn render_device_card(device: &DeviceRender, cx: &Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let power_color = if device.powered {
            theme.success
        } else {
            theme.muted_foreground
        };
        let border = if device.selected {
            gpui::rgb(SELECTED_ACCENT)
        } else {
            gpui::rgb(0x2d3748)
        };

        v_flex()
            .w(px(DEVICE_CARD_WIDTH))
            .gap_2()
            .p_3()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .border_1()
            .border_color(border)
            .when_some(device.intensity, |this, intensity| {
                this.opacity(intensity.clamp(0.0, 1.0) as f32)
            })
            .child(
                h_flex()
                    .justify_between()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .font_semibold()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child(device.title.clone()),
                    )
                    .child(
                        div()
                            .px_2()
                            .rounded_md()
                            .bg(gpui::rgba(0x00000033))
                            .text_xs()
                            .text_color(power_color)
                            .child(device.power_label),
                    ),
            )
            .child(
                h_flex()
                    .justify_between()
                    .items_end()
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(device.value.caption()),
                    )
                    .child(
                        div()
                            .text_lg()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child(device.value.display()),
                    ),
            )
            .when(device.selected, |this| {
                this.child(
                    div()
                        .text_xs()
                        .text_color(gpui::rgb(SELECTED_ACCENT))
                        .child("● selected"),
                )
            })
            .into_any_element()
    }
}
