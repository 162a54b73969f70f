//! Boundary validation for composition requests.
//!
//! Everything here runs before a task record exists; a failure maps to an
//! HTTP 400 and never spawns a process.

use thiserror::Error;

use super::types::{CompositionMode, CompositionRequest, InputRole, PlacementRect};

/// A structurally invalid composition request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("inputs must not be empty")]
    EmptyInputs,

    #[error("mode {mode} requires at least {min} inputs, got {got}")]
    TooFewInputs {
        mode: &'static str,
        min: usize,
        got: usize,
    },

    #[error("mode {mode} requires exactly {expected} video input(s), got {got}")]
    WrongInputCount {
        mode: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("input {index}: trim window start {start} must be before end {end}")]
    InvalidTrim { index: usize, start: f64, end: f64 },

    #[error("input {index}: placement rectangle must have positive width and height")]
    NonPositiveRect { index: usize },

    #[error(
        "input {index}: placement rectangle ({x},{y} {w}x{h}) exceeds output bounds {ow}x{oh}"
    )]
    RectOutOfBounds {
        index: usize,
        x: i64,
        y: i64,
        w: u32,
        h: u32,
        ow: u32,
        oh: u32,
    },

    #[error("input {index}: opacity {opacity} outside [0, 1]")]
    InvalidOpacity { index: usize, opacity: f32 },

    #[error("input {index}: volume multiplier must be non-negative")]
    InvalidVolume { index: usize },

    #[error("input {index}: hold duration must be positive")]
    InvalidHold { index: usize },

    #[error("picture_in_picture requires exactly one main input, got {got}")]
    MainRoleCount { got: usize },

    #[error("picture_in_picture overlay input {index} is missing a placement rectangle")]
    MissingPlacement { index: usize },

    #[error("audio_video_subtitle requires an audio_track")]
    MissingAudioTrack,

    #[error("grid {rows}x{cols} cannot accommodate {inputs} inputs")]
    GridTooSmall { rows: u32, cols: u32, inputs: usize },

    #[error("output resolution must be positive, got {width}x{height}")]
    InvalidOutputSpec { width: u32, height: u32 },

    #[error("transition duration must be non-negative")]
    InvalidTransition,
}

/// Validate a composition request against the mode's structural invariants.
pub fn validate_request(request: &CompositionRequest) -> Result<(), RequestError> {
    if request.inputs.is_empty() {
        return Err(RequestError::EmptyInputs);
    }

    let output = &request.output;
    if output.width == 0 || output.height == 0 {
        return Err(RequestError::InvalidOutputSpec {
            width: output.width,
            height: output.height,
        });
    }

    if request.transition_secs < 0.0 {
        return Err(RequestError::InvalidTransition);
    }

    for (index, input) in request.inputs.iter().enumerate() {
        if let Some(trim) = &input.trim {
            if trim.start < 0.0 || trim.start >= trim.end {
                return Err(RequestError::InvalidTrim {
                    index,
                    start: trim.start,
                    end: trim.end,
                });
            }
        }

        if let Some(placement) = &input.placement {
            validate_placement(index, placement, output.width, output.height)?;
        }

        if let Some(volume) = input.volume {
            if volume < 0.0 {
                return Err(RequestError::InvalidVolume { index });
            }
        }

        if let Some(hold) = input.hold_secs {
            if hold <= 0.0 {
                return Err(RequestError::InvalidHold { index });
            }
        }
    }

    match request.mode {
        CompositionMode::Concat | CompositionMode::Slideshow => Ok(()),
        CompositionMode::PictureInPicture => validate_picture_in_picture(request),
        CompositionMode::SideBySide => {
            if request.inputs.len() < 2 {
                return Err(RequestError::TooFewInputs {
                    mode: "side_by_side",
                    min: 2,
                    got: request.inputs.len(),
                });
            }
            Ok(())
        }
        CompositionMode::Grid => {
            if let Some(grid) = &request.grid {
                let capacity = grid.rows as usize * grid.cols as usize;
                if capacity < request.inputs.len() {
                    return Err(RequestError::GridTooSmall {
                        rows: grid.rows,
                        cols: grid.cols,
                        inputs: request.inputs.len(),
                    });
                }
            }
            Ok(())
        }
        CompositionMode::AudioVideoSubtitle => {
            if request.inputs.len() != 1 {
                return Err(RequestError::WrongInputCount {
                    mode: "audio_video_subtitle",
                    expected: 1,
                    got: request.inputs.len(),
                });
            }
            if request.audio_track.is_none() {
                return Err(RequestError::MissingAudioTrack);
            }
            Ok(())
        }
    }
}

fn validate_placement(
    index: usize,
    placement: &PlacementRect,
    out_width: u32,
    out_height: u32,
) -> Result<(), RequestError> {
    if placement.width == 0 || placement.height == 0 {
        return Err(RequestError::NonPositiveRect { index });
    }

    if !(0.0..=1.0).contains(&placement.opacity) {
        return Err(RequestError::InvalidOpacity {
            index,
            opacity: placement.opacity,
        });
    }

    let right = placement.x + placement.width as i64;
    let bottom = placement.y + placement.height as i64;
    if placement.x < 0 || placement.y < 0 || right > out_width as i64 || bottom > out_height as i64
    {
        return Err(RequestError::RectOutOfBounds {
            index,
            x: placement.x,
            y: placement.y,
            w: placement.width,
            h: placement.height,
            ow: out_width,
            oh: out_height,
        });
    }

    Ok(())
}

fn validate_picture_in_picture(request: &CompositionRequest) -> Result<(), RequestError> {
    let mains = request
        .inputs
        .iter()
        .filter(|i| i.role == Some(InputRole::Main))
        .count();
    if mains != 1 {
        return Err(RequestError::MainRoleCount { got: mains });
    }

    if request.inputs.len() < 2 {
        return Err(RequestError::TooFewInputs {
            mode: "picture_in_picture",
            min: 2,
            got: request.inputs.len(),
        });
    }

    for (index, input) in request.inputs.iter().enumerate() {
        if input.role != Some(InputRole::Main) && input.placement.is_none() {
            return Err(RequestError::MissingPlacement { index });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::types::{CompositionMode, GridSpec, InputClip, InputRole, PlacementRect};

    fn pip_request() -> CompositionRequest {
        CompositionRequest::new(
            CompositionMode::PictureInPicture,
            vec![
                InputClip::new("/data/main.mp4").with_role(InputRole::Main),
                InputClip::new("/data/over.mp4")
                    .with_role(InputRole::Overlay)
                    .with_placement(PlacementRect {
                        x: 50,
                        y: 50,
                        width: 320,
                        height: 240,
                        opacity: 0.8,
                    }),
            ],
        )
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let request = CompositionRequest::new(CompositionMode::Concat, vec![]);
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::EmptyInputs)
        ));
    }

    #[test]
    fn test_valid_pip_accepted() {
        assert!(validate_request(&pip_request()).is_ok());
    }

    #[test]
    fn test_pip_requires_single_main() {
        let mut request = pip_request();
        request.inputs[1].role = Some(InputRole::Main);
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::MainRoleCount { got: 2 })
        ));
    }

    #[test]
    fn test_overlay_requires_placement() {
        let mut request = pip_request();
        request.inputs[1].placement = None;
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::MissingPlacement { index: 1 })
        ));
    }

    #[test]
    fn test_rect_out_of_bounds_rejected() {
        let mut request = pip_request();
        request.inputs[1].placement = Some(PlacementRect {
            x: 1100,
            y: 50,
            width: 320,
            height: 240,
            opacity: 1.0,
        });
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::RectOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_zero_area_rect_rejected() {
        let mut request = pip_request();
        request.inputs[1].placement = Some(PlacementRect {
            x: 0,
            y: 0,
            width: 0,
            height: 240,
            opacity: 1.0,
        });
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::NonPositiveRect { index: 1 })
        ));
    }

    #[test]
    fn test_inverted_trim_rejected() {
        let mut request = CompositionRequest::new(
            CompositionMode::Concat,
            vec![InputClip::new("/a.mp4").with_trim(10.0, 5.0)],
        );
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::InvalidTrim { index: 0, .. })
        ));
        request.inputs[0].trim = None;
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_avs_requires_audio_track() {
        let request = CompositionRequest::new(
            CompositionMode::AudioVideoSubtitle,
            vec![InputClip::new("/a.mp4")],
        );
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::MissingAudioTrack)
        ));
    }

    #[test]
    fn test_avs_rejects_multiple_videos() {
        let request = CompositionRequest::new(
            CompositionMode::AudioVideoSubtitle,
            vec![InputClip::new("/a.mp4"), InputClip::new("/b.mp4")],
        );
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::WrongInputCount { got: 2, .. })
        ));
    }

    #[test]
    fn test_explicit_grid_too_small() {
        let mut request = CompositionRequest::new(
            CompositionMode::Grid,
            (0..5).map(|i| InputClip::new(format!("/in{i}.mp4"))).collect(),
        );
        request.grid = Some(GridSpec { rows: 2, cols: 2 });
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::GridTooSmall { inputs: 5, .. })
        ));
    }

    #[test]
    fn test_side_by_side_needs_two() {
        let request =
            CompositionRequest::new(CompositionMode::SideBySide, vec![InputClip::new("/a.mp4")]);
        assert!(matches!(
            validate_request(&request),
            Err(RequestError::TooFewInputs { got: 1, .. })
        ));
    }
}
