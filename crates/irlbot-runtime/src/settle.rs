//! Wait between switching to the intro scene and starting the stream.

use std::time::Duration;

use async_trait::async_trait;

/// Waits until a freshly selected scene is ready to be captured.
#[async_trait]
pub trait SceneSettle: Send + Sync {
    /// Return once `scene` can go live.
    async fn wait_for_scene(&self, scene: &str);
}

/// Blind fixed delay. OBS exposes no readiness signal for scene loading.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl SceneSettle for FixedDelay {
    async fn wait_for_scene(&self, _scene: &str) {
        tokio::time::sleep(self.0).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_sleeps_for_its_duration() {
        let start = Instant::now();
        FixedDelay(Duration::from_secs(1)).wait_for_scene("Intro").await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
