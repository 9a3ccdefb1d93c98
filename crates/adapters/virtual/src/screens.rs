//! Canned target-app screens.
//!
//! Each screen is laid out on a 1080 px wide display. The chat variants
//! differ only in how the send control can be recognised.

use whatsend_domain::ui_tree::{Rect, UiElement, UiTree};

pub const SCREEN_WIDTH: u32 = 1080;
pub const SEND_VIEW_ID: &str = "com.whatsapp:id/send";

const FRAME_LAYOUT: &str = "android.widget.FrameLayout";
const IMAGE_BUTTON: &str = "android.widget.ImageButton";

fn window() -> UiElement {
    UiElement::new(FRAME_LAYOUT).bounds(Rect::new(0, 0, 1080, 2340))
}

fn toolbar() -> UiElement {
    UiElement::new("android.view.ViewGroup")
        .view_id("com.whatsapp:id/toolbar")
        .bounds(Rect::new(0, 0, 1080, 160))
        .child(
            UiElement::new("android.widget.TextView")
                .view_id("com.whatsapp:id/conversation_contact_name")
                .text("+964 750 123 4567")
                .bounds(Rect::new(160, 40, 700, 120)),
        )
}

fn emoji_button() -> UiElement {
    UiElement::new(IMAGE_BUTTON)
        .content_description("Emoji")
        .clickable(true)
        .bounds(Rect::new(20, 2200, 130, 2310))
}

fn entry(message: &str) -> UiElement {
    UiElement::new("android.widget.EditText")
        .view_id("com.whatsapp:id/entry")
        .text(message)
        .clickable(true)
        .bounds(Rect::new(140, 2200, 930, 2310))
}

fn send_bounds() -> Rect {
    Rect::new(950, 2200, 1060, 2310)
}

/// Conversation screen whose send control carries its resource id.
#[must_use]
pub fn chat_with_send_id(message: &str) -> UiTree {
    UiTree::from_element(
        window().child(toolbar()).child(
            UiElement::new("android.widget.LinearLayout")
                .child(emoji_button())
                .child(entry(message))
                .child(
                    UiElement::new(IMAGE_BUTTON)
                        .view_id(SEND_VIEW_ID)
                        .content_description("Send")
                        .clickable(true)
                        .bounds(send_bounds()),
                ),
        ),
    )
}

/// Conversation screen where the send control is only labelled.
#[must_use]
pub fn chat_with_label_only(message: &str, label: &str) -> UiTree {
    UiTree::from_element(
        window().child(toolbar()).child(
            UiElement::new("android.widget.LinearLayout")
                .child(emoji_button())
                .child(entry(message))
                .child(
                    UiElement::new("android.view.View")
                        .content_description(label)
                        .clickable(true)
                        .bounds(send_bounds()),
                ),
        ),
    )
}

/// Conversation screen with nothing but an unlabelled image button on the
/// right edge.
#[must_use]
pub fn chat_with_image_button_only(message: &str) -> UiTree {
    UiTree::from_element(
        window().child(toolbar()).child(
            UiElement::new("android.widget.LinearLayout")
                .child(
                    UiElement::new(IMAGE_BUTTON)
                        .clickable(true)
                        .bounds(Rect::new(20, 2200, 130, 2310)),
                )
                .child(entry(message))
                .child(
                    UiElement::new(IMAGE_BUTTON)
                        .clickable(true)
                        .bounds(send_bounds()),
                ),
        ),
    )
}

/// Splash screen shown while the conversation loads.
#[must_use]
pub fn loading() -> UiTree {
    UiTree::from_element(
        window().child(
            UiElement::new("android.widget.ProgressBar").bounds(Rect::new(440, 1070, 640, 1270)),
        ),
    )
}
