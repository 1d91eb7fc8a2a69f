//! Screen geometry and color primitives.
//!
//! Coordinates share the OS display space: the origin is the top-left
//! corner of the main display and `y` grows downwards.

use serde::{Deserialize, Serialize};

/// A point on screen, in display coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle anchored at its top-left corner.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `point` lies inside the rectangle (right/bottom edges excluded).
    pub fn contains(&self, point: Point) -> bool {
        let (px, py) = (i64::from(point.x), i64::from(point.y));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x && py >= y && px < x + i64::from(self.width) && py < y + i64::from(self.height)
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return self.contains(other.origin());
        }
        let right = i64::from(other.x) + i64::from(other.width);
        let bottom = i64::from(other.y) + i64::from(other.height);
        self.contains(other.origin())
            && right <= i64::from(self.x) + i64::from(self.width)
            && bottom <= i64::from(self.y) + i64::from(self.height)
    }

    /// Iterate over every point of the rectangle, row by row.
    ///
    /// Points beyond `i32::MAX` on either axis cannot be represented and
    /// are not yielded.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        let (x0, y0) = (self.x, self.y);
        let columns = i32::try_from(self.width).unwrap_or(i32::MAX);
        let rows = i32::try_from(self.height).unwrap_or(i32::MAX);
        (0..rows)
            .map_while(move |dy| y0.checked_add(dy))
            .flat_map(move |y| {
                (0..columns)
                    .map_while(move |dx| x0.checked_add(dx))
                    .map(move |x| Point::new(x, y))
            })
    }
}

/// A 24-bit RGB color.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Largest possible distance between two colors (black to white).
    pub const MAX_DISTANCE: f64 = 441.672_955_930_063_7;

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance between two colors in RGB space.
    pub fn distance(&self, other: &Rgb) -> f64 {
        let dr = f64::from(self.r) - f64::from(other.r);
        let dg = f64::from(self.g) - f64::from(other.g);
        let db = f64::from(self.b) - f64::from(other.b);
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// Whether `other` is within `threshold` of this color.
    pub fn matches(&self, other: &Rgb, threshold: f64) -> bool {
        self.distance(other) <= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let a = Rgb::new(12, 200, 77);
        let b = Rgb::new(250, 3, 90);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_black_to_white_is_max() {
        let black = Rgb::new(0, 0, 0);
        let white = Rgb::new(255, 255, 255);
        assert!((black.distance(&white) - Rgb::MAX_DISTANCE).abs() < 1e-9);
    }

    #[test]
    fn test_zero_threshold_requires_exact_color() {
        let a = Rgb::new(10, 10, 10);
        assert!(a.matches(&Rgb::new(10, 10, 10), 0.0));
        assert!(!a.matches(&Rgb::new(10, 10, 11), 0.0));
    }

    #[test]
    fn test_rect_points_are_row_major() {
        let rect = Rect::new(5, 7, 2, 2);
        let points: Vec<_> = rect.points().collect();
        assert_eq!(
            points,
            vec![
                Point::new(5, 7),
                Point::new(6, 7),
                Point::new(5, 8),
                Point::new(6, 8)
            ]
        );
    }

    #[test]
    fn test_rect_points_stop_at_coordinate_limit() {
        let rect = Rect::new(i32::MAX - 1, 0, 5, 1);
        assert_eq!(
            rect.points().collect::<Vec<_>>(),
            vec![Point::new(i32::MAX - 1, 0), Point::new(i32::MAX, 0)]
        );

        let tall = Rect::new(0, i32::MAX, 1, u32::MAX);
        assert_eq!(tall.points().count(), 1);
    }

    #[test]
    fn test_rect_contains() {
        let screen = Rect::new(0, 0, 1920, 1080);
        assert!(screen.contains(Point::new(0, 0)));
        assert!(screen.contains(Point::new(1919, 1079)));
        assert!(!screen.contains(Point::new(1920, 5)));
        assert!(!screen.contains(Point::new(-1, 5)));
        assert!(screen.contains_rect(&Rect::new(100, 100, 20, 20)));
        assert!(!screen.contains_rect(&Rect::new(1910, 100, 20, 20)));
    }
}
