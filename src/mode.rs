use crate::models::{ChatMode, EffectiveMode};

/// `Auto` follows connectivity; explicit selections pass through, so an `Online` pick while
/// disconnected still attempts the network and fails there.
pub fn effective_mode(selected: ChatMode, is_connected: bool) -> EffectiveMode {
    match selected {
        ChatMode::Online => EffectiveMode::Online,
        ChatMode::Offline => EffectiveMode::Offline,
        ChatMode::Auto if is_connected => EffectiveMode::Online,
        ChatMode::Auto => EffectiveMode::Offline,
    }
}
