use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: tracing::Level,
    pub logging_enabled: bool,
    pub logger_name: String,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    pub fn logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn logger_name<S: Into<String>>(mut self, logger_name: S) -> Self {
        self.logger_name = logger_name.into();
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            logging_enabled: true,
            logger_name: "launch_matrix".to_string(),
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> EnvFilter {
        // RUST_LOG wins over the configured level when set.
        EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy()
    }

    /// Install the subscriber process-wide. Returns `false` if logging is
    /// disabled or another global subscriber was already set.
    pub fn init_global(&self) -> bool {
        if !self.logging_enabled {
            return false;
        }
        let installed = tracing_subscriber::registry()
            .with(self.filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .is_ok();
        if installed {
            crate::debug!("Started {} logger", self.logger_name);
        }
        installed
    }
}

/// Global test logger honouring `RUST_LOG`; safe to call from every test.
pub fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
