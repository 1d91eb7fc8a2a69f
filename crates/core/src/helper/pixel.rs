//! Pixel condition engine.
//!
//! Checks sample the screen once. Waits repeat a check on a fixed interval
//! until it matches or the time budget runs out; running out of time is a
//! `matched: false` result, never an error. Capture failures abort the
//! wait immediately.

use crate::helper::error::HelperError;
use crate::platform::Desktop;
use mk_protocol::config_models::HelperSettings;
use mk_protocol::geometry::{Point, Rect, Rgb};
use mk_protocol::ipc::{WaitPixelStateParams, WaitPixelZoneParams, WaitResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Clone)]
pub struct PixelEngine {
    desktop: Arc<dyn Desktop>,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl PixelEngine {
    pub fn new(desktop: Arc<dyn Desktop>, settings: HelperSettings) -> Self {
        Self {
            desktop,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            default_timeout: Duration::from_millis(settings.default_timeout_ms),
        }
    }

    /// Fail with `OutOfBounds` unless `point` lies on some display.
    pub async fn ensure_on_screen(&self, point: Point) -> Result<(), HelperError> {
        let displays = self.desktop.displays().await?;
        if displays.iter().any(|d| d.contains(point)) {
            Ok(())
        } else {
            Err(HelperError::OutOfBounds(format!(
                "({}, {}) is outside every display",
                point.x, point.y
            )))
        }
    }

    /// Fail with `OutOfBounds` unless `rect` is non-empty and fits on one display.
    pub async fn ensure_zone_on_screen(&self, rect: Rect) -> Result<(), HelperError> {
        if rect.is_empty() {
            return Err(HelperError::OutOfBounds(format!(
                "zone {}x{} at ({}, {}) is empty",
                rect.width, rect.height, rect.x, rect.y
            )));
        }
        let displays = self.desktop.displays().await?;
        if displays.iter().any(|d| d.contains_rect(&rect)) {
            Ok(())
        } else {
            Err(HelperError::OutOfBounds(format!(
                "zone {}x{} at ({}, {}) does not fit on a display",
                rect.width, rect.height, rect.x, rect.y
            )))
        }
    }

    /// Sample one pixel. An off-screen position is a `CaptureError` here;
    /// only the waits report `OutOfBounds`.
    pub async fn get_pixel_color(&self, point: Point) -> Result<Rgb, HelperError> {
        self.ensure_on_screen(point).await.map_err(|e| match e {
            HelperError::OutOfBounds(reason) => HelperError::Capture(reason),
            other => other,
        })?;
        Ok(self.desktop.pixel(point).await?)
    }

    /// Whether the pixel at `point` is within `threshold` of `color`.
    pub async fn check_pixel_state(
        &self,
        point: Point,
        color: Rgb,
        threshold: f64,
    ) -> Result<bool, HelperError> {
        let sampled = self.desktop.pixel(point).await?;
        Ok(sampled.matches(&color, threshold))
    }

    /// Whether any pixel of `rect` is within `threshold` of `color`.
    ///
    /// Scans row by row and stops at the first match.
    pub async fn check_pixel_zone(
        &self,
        rect: Rect,
        color: Rgb,
        threshold: f64,
    ) -> Result<bool, HelperError> {
        let grid = self.desktop.capture(rect).await?;
        let hit = grid
            .iter()
            .any(|(_, sampled)| sampled.matches(&color, threshold));
        Ok(hit)
    }

    pub async fn wait_for_pixel_state(
        &self,
        params: WaitPixelStateParams,
    ) -> Result<WaitResult, HelperError> {
        self.ensure_on_screen(params.position).await?;
        let timeout = self.timeout(params.timeout_ms);
        self.poll(timeout, move || {
            self.check_pixel_state(params.position, params.color, params.threshold)
        })
        .await
    }

    pub async fn wait_for_pixel_zone(
        &self,
        params: WaitPixelZoneParams,
    ) -> Result<WaitResult, HelperError> {
        self.ensure_zone_on_screen(params.rect).await?;
        let timeout = self.timeout(params.timeout_ms);
        self.poll(timeout, move || {
            self.check_pixel_zone(params.rect, params.color, params.threshold)
        })
        .await
    }

    fn timeout(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    async fn poll<F, Fut>(&self, timeout: Duration, mut check: F) -> Result<WaitResult, HelperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, HelperError>>,
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let matched = check().await?;
            let elapsed = start.elapsed();

            if matched || elapsed >= timeout {
                debug!(matched, attempts, elapsed_ms = elapsed.as_millis() as u64, "Wait finished");
                return Ok(WaitResult {
                    matched,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockDesktop;

    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };

    fn engine(mock: &Arc<MockDesktop>) -> PixelEngine {
        PixelEngine::new(mock.clone(), HelperSettings::default())
    }

    #[tokio::test]
    async fn test_zero_threshold_is_exact() {
        let mock = Arc::new(MockDesktop::default());
        mock.set_pixel(Point::new(3, 3), Rgb::new(10, 20, 30));
        let engine = engine(&mock);

        assert!(engine
            .check_pixel_state(Point::new(3, 3), Rgb::new(10, 20, 30), 0.0)
            .await
            .unwrap());
        assert!(!engine
            .check_pixel_state(Point::new(3, 3), Rgb::new(10, 20, 31), 0.0)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_zone_check_over_filled_zone() {
        let mock = Arc::new(MockDesktop::default());
        mock.fill_rect(Rect::new(40, 40, 3, 3), Rgb::new(250, 5, 0));
        let engine = engine(&mock);

        // Every pixel is off by sqrt(50) from red.
        assert!(engine
            .check_pixel_zone(Rect::new(39, 39, 2, 2), RED, 7.1)
            .await
            .unwrap());
        assert!(!engine
            .check_pixel_zone(Rect::new(40, 40, 3, 3), RED, 7.0)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_zone_check_finds_any_matching_pixel() {
        let mock = Arc::new(MockDesktop::default());
        mock.set_pixel(Point::new(14, 12), RED);
        let engine = engine(&mock);

        assert!(engine
            .check_pixel_zone(Rect::new(10, 10, 5, 5), RED, 0.0)
            .await
            .unwrap());
        assert!(!engine
            .check_pixel_zone(Rect::new(10, 10, 4, 5), RED, 0.0)
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zone_wait_times_out_only_after_full_budget() {
        let mock = Arc::new(MockDesktop::default());
        let engine = engine(&mock);
        let params = WaitPixelZoneParams {
            rect: Rect::new(0, 0, 4, 4),
            color: RED,
            threshold: 5.0,
            timeout_ms: Some(1_000),
        };

        let result = engine.wait_for_pixel_zone(params).await.unwrap();

        assert!(!result.matched);
        assert_eq!(result.elapsed_ms, 1_000);
        // One check at t=0 and one per 50 ms interval up to the deadline.
        assert_eq!(mock.captures(), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_wait_matches_once_pixel_changes() {
        let mock = Arc::new(MockDesktop::default());
        let engine = engine(&mock);
        let params = WaitPixelStateParams {
            position: Point::new(50, 50),
            color: RED,
            threshold: 0.0,
            timeout_ms: None,
        };

        let painter = {
            let mock = mock.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                mock.set_pixel(Point::new(50, 50), RED);
            })
        };

        let result = engine.wait_for_pixel_state(params).await.unwrap();
        painter.await.unwrap();

        assert!(result.matched);
        assert_eq!(result.elapsed_ms, 150);
    }

    #[tokio::test]
    async fn test_off_screen_fails_without_polling() {
        let mock = Arc::new(MockDesktop::new(Rect::new(0, 0, 100, 100)));
        let engine = engine(&mock);

        let err = engine
            .wait_for_pixel_state(WaitPixelStateParams {
                position: Point::new(100, 5),
                color: RED,
                threshold: 0.0,
                timeout_ms: Some(10_000),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HelperError::OutOfBounds(_)));
        assert_eq!(mock.captures(), 0);
    }

    #[tokio::test]
    async fn test_capture_failure_is_an_error_not_a_timeout() {
        let mock = Arc::new(MockDesktop::default());
        mock.deny_capture(true);
        let engine = engine(&mock);

        let err = engine
            .wait_for_pixel_state(WaitPixelStateParams {
                position: Point::new(1, 1),
                color: RED,
                threshold: 0.0,
                timeout_ms: Some(10_000),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HelperError::Capture(_)));
    }
}
