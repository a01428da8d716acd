use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wait_indicator::{
    async_trait, CancelableWaitDialog, ConfigError, ConfigResult, DialogError, DialogStartOptions,
    DialogUpdate, WaitDialog, WaitDialogCallback, WaitDialogFactory, WaitDialogService,
};

use crate::cancel::{lock, CancelHandle, CancelRegistry, DialogId};

/// Configuration of the terminal spinner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinnerConfig {
    /// How often the spinner advances, in milliseconds
    pub tick_interval_ms: u64,

    /// indicatif template used to draw each wait
    pub template: String,

    /// Appended to the message of waits the user can cancel
    pub cancel_hint: Option<String>,
}

impl Default for SpinnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            template: "  {spinner:.green} {prefix:30!} {wide_msg:.dim}".to_string(),
            cancel_hint: Some("press Ctrl-C to cancel".to_string()),
        }
    }
}

impl SpinnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how often the spinner advances
    pub fn with_tick_interval(mut self, interval: Duration) -> ConfigResult<Self> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidTickInterval { interval });
        }
        self.tick_interval_ms = interval.as_millis().max(1) as u64;
        Ok(self)
    }

    /// Set the template used to draw each wait
    pub fn with_template(mut self, template: impl Into<String>) -> ConfigResult<Self> {
        let template = template.into();
        parse_template(&template)?;
        self.template = template;
        Ok(self)
    }

    /// Set the hint shown next to cancelable waits
    pub fn with_cancel_hint(mut self, hint: Option<String>) -> Self {
        self.cancel_hint = hint;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval {
                interval: Duration::ZERO,
            });
        }
        parse_template(&self.template)?;
        Ok(())
    }

    /// The style every spinner of this configuration is drawn with
    pub fn spinner_style(&self) -> ConfigResult<ProgressStyle> {
        parse_template(&self.template)
    }

    fn message(&self, message: &str, cancelable: bool) -> String {
        match (&self.cancel_hint, cancelable) {
            (Some(hint), true) => format!("{message} ({hint})"),
            _ => message.to_string(),
        }
    }
}

fn parse_template(template: &str) -> ConfigResult<ProgressStyle> {
    ProgressStyle::with_template(template).map_err(|err| ConfigError::InvalidTemplate {
        reason: err.to_string(),
    })
}

struct SpinnerShared {
    /// The multi-progress bar. Usually, this is the global multi-progress bar.
    multi_progress: MultiProgress,
    config: SpinnerConfig,
    registry: Arc<CancelRegistry>,
    /// A map of progress bars, by dialog.
    bars: Mutex<IndexMap<DialogId, ProgressBar>>,
}

/// A dialog service that draws every wait as an indicatif spinner.
///
/// Nested waits are stacked below each other. The user cannot click a
/// terminal spinner, so cancellation goes through the [`CancelHandle`]
/// returned by [`SpinnerDialogService::cancel_handle`].
#[derive(Clone)]
pub struct SpinnerDialogService {
    shared: Arc<SpinnerShared>,
}

impl SpinnerDialogService {
    /// Draws to a new multi-progress bar with the default configuration
    pub fn new() -> Self {
        Self::build(MultiProgress::new(), SpinnerConfig::default())
    }

    /// Draws to `multi_progress` with a custom configuration
    pub fn with_config(multi_progress: MultiProgress, config: SpinnerConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(multi_progress, config))
    }

    fn build(multi_progress: MultiProgress, config: SpinnerConfig) -> Self {
        Self {
            shared: Arc::new(SpinnerShared {
                multi_progress,
                config,
                registry: Arc::new(CancelRegistry::default()),
                bars: Mutex::new(IndexMap::new()),
            }),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.shared.registry.clone())
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.shared.multi_progress
    }

    pub fn config(&self) -> &SpinnerConfig {
        &self.shared.config
    }

    /// Returns the number of spinners currently drawn
    pub fn open_dialogs(&self) -> usize {
        lock(&self.shared.bars).len()
    }
}

impl Default for SpinnerDialogService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WaitDialogService for SpinnerDialogService {
    async fn factory(&self) -> Result<Arc<dyn WaitDialogFactory>, DialogError> {
        Ok(Arc::new(self.clone()))
    }
}

impl WaitDialogFactory for SpinnerDialogService {
    fn create_instance(&self) -> Result<Option<Box<dyn WaitDialog>>, DialogError> {
        Ok(Some(Box::new(SpinnerWaitDialog {
            id: self.shared.registry.next_dialog_id(),
            shared: self.shared.clone(),
            cancelable: false,
            current_step: 0,
        })))
    }
}

/// A single spinner, alive from `start_with_callback` until `end`
pub struct SpinnerWaitDialog {
    id: DialogId,
    shared: Arc<SpinnerShared>,
    cancelable: bool,
    current_step: u32,
}

impl SpinnerWaitDialog {
    fn close(&mut self) -> bool {
        self.shared.registry.unregister(self.id);
        let removed = lock(&self.shared.bars).shift_remove(&self.id);
        match removed {
            Some(pb) => {
                pb.finish_and_clear();
                true
            }
            None => false,
        }
    }
}

impl WaitDialog for SpinnerWaitDialog {
    fn into_cancelable(self: Box<Self>) -> Option<Box<dyn CancelableWaitDialog>> {
        Some(self)
    }
}

impl CancelableWaitDialog for SpinnerWaitDialog {
    fn start_with_callback(
        &mut self,
        options: &DialogStartOptions<'_>,
        callback: Arc<dyn WaitDialogCallback>,
    ) -> Result<(), DialogError> {
        let config = &self.shared.config;
        let style = config
            .spinner_style()
            .map_err(|err| DialogError::session(err.to_string()))?;

        let mut bars = lock(&self.shared.bars);
        let pb = match bars.last() {
            Some((_, last)) => self
                .shared
                .multi_progress
                .insert_after(last, ProgressBar::hidden()),
            None => self.shared.multi_progress.add(ProgressBar::hidden()),
        };
        pb.set_style(style);
        pb.set_prefix(options.title.to_string());
        pb.set_message(config.message(options.message, options.cancelable));
        pb.enable_steady_tick(config.tick_interval());
        bars.insert(self.id, pb);
        drop(bars);

        self.cancelable = options.cancelable;
        self.current_step = options.current_step;
        self.shared
            .registry
            .register(self.id, callback, options.cancelable);
        debug!(dialog = self.id.0, title = options.title, "spinner started");
        Ok(())
    }

    fn update_progress(&mut self, update: &DialogUpdate<'_>) -> Result<bool, DialogError> {
        self.cancelable = !update.disable_cancel;
        self.current_step = update.current_step;

        if let Some(pb) = lock(&self.shared.bars).get(&self.id) {
            pb.set_message(self.shared.config.message(update.message, self.cancelable));
        }
        self.shared
            .registry
            .set_cancelable(self.id, self.cancelable);
        Ok(self.shared.registry.is_canceled(self.id))
    }

    fn end(&mut self) -> Result<u32, DialogError> {
        if self.close() {
            debug!(dialog = self.id.0, "spinner finished");
        }
        Ok(self.current_step)
    }
}

impl Drop for SpinnerWaitDialog {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wait_indicator::{
        CancellationToken, InlineForeground, OperationError, Outcome, WaitIndicatorInstance,
        WaitRequest,
    };

    #[derive(Default)]
    struct Flag(AtomicBool);

    impl WaitDialogCallback for Flag {
        fn on_canceled(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn hidden_service() -> SpinnerDialogService {
        SpinnerDialogService::with_config(
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            SpinnerConfig::default(),
        )
        .unwrap()
    }

    fn open(service: &SpinnerDialogService) -> Box<dyn CancelableWaitDialog> {
        let dialog = service.create_instance().unwrap().unwrap();
        dialog.into_cancelable().unwrap()
    }

    fn messages(service: &SpinnerDialogService) -> Vec<(String, String)> {
        lock(&service.shared.bars)
            .values()
            .map(|pb| (pb.prefix(), pb.message()))
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(SpinnerConfig::default().validate().is_ok());
        assert_eq!(
            SpinnerConfig::new().with_tick_interval(Duration::ZERO),
            Err(ConfigError::InvalidTickInterval {
                interval: Duration::ZERO
            })
        );
        assert!(matches!(
            SpinnerConfig::new().with_template("{spinner:.nocolor"),
            Err(ConfigError::InvalidTemplate { .. })
        ));

        let config = SpinnerConfig::new()
            .with_tick_interval(Duration::from_millis(250))
            .unwrap()
            .with_cancel_hint(None);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.message("working", true), "working");
    }

    #[test]
    fn test_config_deserialize() {
        let config: SpinnerConfig = serde_json::from_str(r#"{"tick_interval_ms": 50}"#).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.cancel_hint, SpinnerConfig::default().cancel_hint);

        let invalid: SpinnerConfig = serde_json::from_str(r#"{"tick_interval_ms": 0}"#).unwrap();
        assert!(invalid.validate().is_err());
        assert!(SpinnerDialogService::with_config(MultiProgress::new(), invalid).is_err());
    }

    #[test]
    fn test_spinner_lifecycle() {
        let service = hidden_service();
        let mut dialog = open(&service);
        dialog
            .start_with_callback(&DialogStartOptions::new("Build", "compiling", true), Arc::new(Flag::default()))
            .unwrap();
        assert_eq!(service.open_dialogs(), 1);
        assert_eq!(
            messages(&service),
            vec![("Build".to_string(), "compiling (press Ctrl-C to cancel)".to_string())]
        );

        assert!(!dialog.update_progress(&DialogUpdate::new("linking", false)).unwrap());
        assert_eq!(messages(&service)[0].1, "linking");

        dialog.end().unwrap();
        assert_eq!(service.open_dialogs(), 0);
        assert!(!service.cancel_handle().has_open_dialog());
        dialog.end().unwrap();
    }

    #[test]
    fn test_nested_spinners_stack() {
        let service = hidden_service();
        let mut outer = open(&service);
        let mut inner = open(&service);
        outer
            .start_with_callback(&DialogStartOptions::new("outer", "a", false), Arc::new(Flag::default()))
            .unwrap();
        inner
            .start_with_callback(&DialogStartOptions::new("inner", "b", false), Arc::new(Flag::default()))
            .unwrap();
        assert_eq!(service.open_dialogs(), 2);

        drop(inner);
        assert_eq!(service.open_dialogs(), 1);
        assert_eq!(messages(&service)[0].0, "outer");
        outer.end().unwrap();
    }

    #[test]
    fn test_cancel_handle_cancels_spinner() {
        let service = hidden_service();
        let flag = Arc::new(Flag::default());
        let mut dialog = open(&service);
        dialog
            .start_with_callback(&DialogStartOptions::new("t", "m", true), flag.clone())
            .unwrap();

        assert!(service.cancel_handle().cancel());
        assert!(flag.0.load(Ordering::SeqCst));
        assert!(dialog.update_progress(&DialogUpdate::new("m", true)).unwrap());
        dialog.end().unwrap();
    }

    #[test]
    fn test_waits_under_spinner() {
        let service = hidden_service();
        let handle = service.cancel_handle();
        let instance = WaitIndicatorInstance::new(Arc::new(InlineForeground), Arc::new(service.clone()));
        futures::executor::block_on(instance.initialize()).unwrap();

        let request = WaitRequest::new("Restore", "restoring").cancelable(true);
        let outcome = instance.wait_for_operation_outcome(&request, Some(|token: CancellationToken| {
            assert_eq!(service.open_dialogs(), 1);
            assert!(handle.cancel());
            if token.is_cancelled() {
                Err(OperationError::Canceled)
            } else {
                Ok(())
            }
        }));
        assert_eq!(outcome.unwrap(), Outcome::Canceled);
        assert_eq!(service.open_dialogs(), 0);

        let value = instance
            .wait_for_operation(&request.clone().cancelable(false), Some(|_token| {
                assert!(!handle.cancel());
                Ok(5)
            }))
            .unwrap();
        assert_eq!(value, 5);
    }
}
