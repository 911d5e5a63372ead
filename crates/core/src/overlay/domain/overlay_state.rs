use std::time::Duration;

use crate::overlay::domain::label_layout::{LabelLayout, LabelStyle};
use crate::overlay::domain::preview_transform::{PreviewTransform, ScreenRect};
use crate::shared::constants::OVERLAY_ANIMATION_SECS;
use crate::shared::region::DetectedRegion;

/// Per-frame result of the processing loop.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayUpdate {
    Show(DetectedRegion),
    Clear,
    Unchanged,
}

/// Bounding box and label as drawn on the preview.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayBox {
    pub rect: ScreenRect,
    pub label: LabelLayout,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum OverlayState {
    #[default]
    NoOverlay,
    ShowingOverlay(OverlayBox),
}

/// What the view layer must do for one update.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayCommand {
    Create(OverlayBox),
    Animate { to: OverlayBox, duration: Duration },
    Remove,
    Keep,
}

pub fn animation_duration() -> Duration {
    Duration::from_secs_f64(OVERLAY_ANIMATION_SECS)
}

/// Overlay state machine.
///
/// | state          | update | command   |
/// |----------------|--------|-----------|
/// | NoOverlay      | Show   | Create    |
/// | ShowingOverlay | Show   | Animate   |
/// | ShowingOverlay | Clear  | Remove    |
/// | any            | other  | Keep      |
pub fn reduce(
    state: &OverlayState,
    update: &OverlayUpdate,
    transform: &PreviewTransform,
    labels: &LabelStyle,
) -> (OverlayState, OverlayCommand) {
    match (state, update) {
        (OverlayState::NoOverlay, OverlayUpdate::Show(region)) => {
            let overlay = layout(region, transform, labels);
            (
                OverlayState::ShowingOverlay(overlay.clone()),
                OverlayCommand::Create(overlay),
            )
        }
        (OverlayState::ShowingOverlay(_), OverlayUpdate::Show(region)) => {
            let overlay = layout(region, transform, labels);
            (
                OverlayState::ShowingOverlay(overlay.clone()),
                OverlayCommand::Animate {
                    to: overlay,
                    duration: animation_duration(),
                },
            )
        }
        (OverlayState::ShowingOverlay(_), OverlayUpdate::Clear) => {
            (OverlayState::NoOverlay, OverlayCommand::Remove)
        }
        _ => (state.clone(), OverlayCommand::Keep),
    }
}

fn layout(region: &DetectedRegion, transform: &PreviewTransform, labels: &LabelStyle) -> OverlayBox {
    let rect = transform.to_screen(&region.bounds);
    OverlayBox {
        rect,
        label: labels.layout(&rect, region),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::region::NormalizedRect;

    fn show(x: f64) -> OverlayUpdate {
        OverlayUpdate::Show(DetectedRegion::new(NormalizedRect::new(x, 0.25, 0.5, 0.5), 0.9))
    }

    fn step(state: &OverlayState, update: &OverlayUpdate) -> (OverlayState, OverlayCommand) {
        reduce(
            state,
            update,
            &PreviewTransform::new(100.0, 200.0),
            &LabelStyle::Recognition,
        )
    }

    #[test]
    fn test_first_show_creates() {
        let (state, cmd) = step(&OverlayState::NoOverlay, &show(0.25));
        let OverlayCommand::Create(overlay) = cmd else {
            panic!("expected Create, got {cmd:?}");
        };
        assert_eq!(overlay.rect, ScreenRect::new(25.0, 50.0, 50.0, 100.0));
        assert_eq!(state, OverlayState::ShowingOverlay(overlay));
    }

    #[test]
    fn test_show_while_showing_animates() {
        let (showing, _) = step(&OverlayState::NoOverlay, &show(0.0));
        let (state, cmd) = step(&showing, &show(0.5));
        match cmd {
            OverlayCommand::Animate { to, duration } => {
                assert_eq!(duration, Duration::from_millis(100));
                assert_eq!(to.rect.x, 50.0);
                assert_eq!(state, OverlayState::ShowingOverlay(to));
            }
            other => panic!("expected Animate, got {other:?}"),
        }
    }

    #[test]
    fn test_clear_while_showing_removes() {
        let (showing, _) = step(&OverlayState::NoOverlay, &show(0.0));
        let (state, cmd) = step(&showing, &OverlayUpdate::Clear);
        assert_eq!(cmd, OverlayCommand::Remove);
        assert_eq!(state, OverlayState::NoOverlay);
    }

    #[test]
    fn test_other_transitions_keep() {
        let (state, cmd) = step(&OverlayState::NoOverlay, &OverlayUpdate::Clear);
        assert_eq!((state, cmd), (OverlayState::NoOverlay, OverlayCommand::Keep));

        let (state, cmd) = step(&OverlayState::NoOverlay, &OverlayUpdate::Unchanged);
        assert_eq!((state, cmd), (OverlayState::NoOverlay, OverlayCommand::Keep));

        let (showing, _) = step(&OverlayState::NoOverlay, &show(0.0));
        let (state, cmd) = step(&showing, &OverlayUpdate::Unchanged);
        assert_eq!(cmd, OverlayCommand::Keep);
        assert_eq!(state, showing);
    }
}
