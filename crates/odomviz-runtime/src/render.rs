//! Drawing contract.
//!
//! A session draws into any [`RenderSurface`].  Coordinates handed to the
//! world view are pixels relative to the robot, +y up; the controls view uses
//! the surface's own pixel space, y down.  Mapping to a real canvas is the
//! implementor's concern.

use odomviz_types::Point2;

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 128, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const GREY: Color = Color::rgb(160, 160, 160);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Something a frame can be drawn on.
pub trait RenderSurface {
    /// Paint the whole surface with `color` at `alpha` (1.0 clears, lower
    /// values leave a fading trail of the previous frame).
    fn clear_or_fade(&mut self, color: Color, alpha: f32);

    fn draw_point(&mut self, at: Point2, color: Color);

    /// Polyline through `points` in order.
    fn draw_line_path(&mut self, points: &[Point2], color: Color);

    fn draw_circle(&mut self, center: Point2, radius: f32, stroke: Color, fill: Option<Color>);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    ClearOrFade { color: Color, alpha: f32 },
    Point { at: Point2, color: Color },
    LinePath { points: Vec<Point2>, color: Color },
    Circle {
        center: Point2,
        radius: f32,
        stroke: Color,
        fill: Option<Color>,
    },
}

/// Surface that keeps the draw list of the latest frame.
///
/// Every `clear_or_fade` starts a new frame.  Used headless by the CLI and by
/// tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    frames: u64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw calls of the current frame, in order.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of frames started so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Points drawn in `color` this frame.
    pub fn points(&self, color: Color) -> Vec<Point2> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Point { at, color: c } if *c == color => Some(*at),
                _ => None,
            })
            .collect()
    }

    /// Paths drawn in `color` this frame.
    pub fn paths(&self, color: Color) -> Vec<&[Point2]> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::LinePath { points, color: c } if *c == color => {
                    Some(points.as_slice())
                }
                _ => None,
            })
            .collect()
    }

    /// `(center, radius)` of every circle drawn this frame.
    pub fn circles(&self) -> Vec<(Point2, f32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Circle { center, radius, .. } => Some((*center, *radius)),
                _ => None,
            })
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn clear_or_fade(&mut self, color: Color, alpha: f32) {
        self.commands.clear();
        self.frames += 1;
        self.commands.push(DrawCommand::ClearOrFade { color, alpha });
    }

    fn draw_point(&mut self, at: Point2, color: Color) {
        self.commands.push(DrawCommand::Point { at, color });
    }

    fn draw_line_path(&mut self, points: &[Point2], color: Color) {
        self.commands.push(DrawCommand::LinePath {
            points: points.to_vec(),
            color,
        });
    }

    fn draw_circle(&mut self, center: Point2, radius: f32, stroke: Color, fill: Option<Color>) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            stroke,
            fill,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_starts_a_new_frame() {
        let mut surface = RecordingSurface::new();
        surface.clear_or_fade(Color::WHITE, 1.0);
        surface.draw_point(Point2::new(1.0, 2.0), Color::RED);
        surface.draw_point(Point2::new(3.0, 4.0), Color::GREY);
        assert_eq!(surface.points(Color::RED), vec![Point2::new(1.0, 2.0)]);

        surface.clear_or_fade(Color::WHITE, 0.3);
        assert_eq!(surface.frames(), 2);
        assert_eq!(
            surface.commands(),
            &[DrawCommand::ClearOrFade {
                color: Color::WHITE,
                alpha: 0.3
            }]
        );
    }

    #[test]
    fn paths_and_circles_are_queryable() {
        let mut surface = RecordingSurface::new();
        surface.draw_line_path(&[Point2::zero(), Point2::new(1.0, 0.0)], Color::GREEN);
        surface.draw_circle(Point2::zero(), 5.0, Color::BLACK, Some(Color::WHITE));
        assert_eq!(surface.paths(Color::GREEN).len(), 1);
        assert!(surface.paths(Color::RED).is_empty());
        assert_eq!(surface.circles(), vec![(Point2::zero(), 5.0)]);
    }
}
