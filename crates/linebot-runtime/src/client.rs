//! The [`LineClient`]: one bot, its handlers and its webhook server.
//!
//! ```rust,ignore
//! use linebot_runtime::LineClient;
//! use linebot_core::EventKind;
//!
//! let client = LineClient::builder().config_file("linebot.toml").build()?;
//! client.on(EventKind::Text, |ctx: EventContext| async move {
//!     let text = ctx.text().unwrap_or_default().to_string();
//!     ctx.reply(text).await?;
//!     Ok(())
//! })?;
//! client.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, error, info, span, warn};

use linebot_core::{BoxedApi, BoxedStore, Event, EventKind, MemoryStore};
use linebot_framework::{
    CommandGroup, Dispatcher, Handler, HandlerFailure, HandlerOptions, HandlerResult, Pipeline,
};
use linebot_transport::{HttpLineApi, WebhookServer};

use crate::config::{ConfigLoader, LinebotConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A bot: configuration, the platform API handle, the store and the
/// handler registry.
///
/// Several clients can live in one process; nothing here is global except
/// the logging subscriber.
pub struct LineClient {
    config: LinebotConfig,
    api: BoxedApi,
    store: BoxedStore,
    dispatcher: Arc<Dispatcher>,
}

impl LineClient {
    /// Starts a builder that loads configuration from the default sources.
    pub fn builder() -> LineClientBuilder {
        LineClientBuilder::new()
    }

    /// Creates a client from a loaded configuration.
    pub fn new(config: LinebotConfig) -> RuntimeResult<Self> {
        Self::builder().config(config).build()
    }

    /// The effective configuration.
    pub fn config(&self) -> &LinebotConfig {
        &self.config
    }

    /// The platform API handle.
    pub fn api(&self) -> &BoxedApi {
        &self.api
    }

    /// The key-value store.
    pub fn store(&self) -> &BoxedStore {
        &self.store
    }

    /// The handler registry.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    // ─── Registration ───────────────────────────────────────────────────────

    /// Registers a handler for `kind`.
    pub fn on<H, T>(&self, kind: EventKind, handler: H) -> RuntimeResult<()>
    where
        H: Handler<T>,
        T: 'static,
    {
        Ok(self.dispatcher.on(kind, handler)?)
    }

    /// Registers a handler with options, e.g. queued sending.
    pub fn on_with<H, T>(
        &self,
        kind: EventKind,
        options: HandlerOptions,
        handler: H,
    ) -> RuntimeResult<()>
    where
        H: Handler<T>,
        T: 'static,
    {
        Ok(self.dispatcher.on_with(kind, options, handler)?)
    }

    /// Registers a handler fired once, on the first valid webhook request.
    pub fn on_ready<F, Fut>(&self, handler: F) -> RuntimeResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Ok(self.dispatcher.on_ready(handler)?)
    }

    /// Routes text messages through a command group.
    pub fn add_commands(&self, group: CommandGroup) -> RuntimeResult<()> {
        Ok(self.dispatcher.add_commands(group)?)
    }

    /// Installs the handler failure hook.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&HandlerFailure, Option<&Event>) + Send + Sync + 'static,
    {
        self.dispatcher.on_error(hook);
    }

    // ─── Serving ────────────────────────────────────────────────────────────

    /// The payload pipeline, configured from `dispatch`.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.api),
            Arc::clone(&self.store),
        )
        .fetch_profile(self.config.dispatch.fetch_profile)
    }

    /// The webhook server, configured from `server` and `channel`.
    pub fn server(&self) -> WebhookServer {
        WebhookServer::new(&self.config.channel.secret, Arc::new(self.pipeline()))
            .path(self.config.server.path.clone())
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// The registry is sealed first; later registrations fail.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.seal();

        let token = CancellationToken::new();
        let trigger = token.clone();
        let watcher = tokio::spawn(async move {
            shutdown.await;
            trigger.cancel();
        });

        let addr = self.config.server.addr();
        let span = span!(Level::INFO, "linebot", addr = %addr);
        let result = self.server().serve(&addr, token).instrument(span).await;
        watcher.abort();

        result?;
        info!("LINE client stopped");
        Ok(())
    }
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("server", &self.config.server)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// LineClientBuilder
// =============================================================================

/// Builder for [`LineClient`].
///
/// Without an explicit [`config`](Self::config), configuration comes from
/// the [`ConfigLoader`]. Without an explicit [`api`](Self::api), the REST
/// client is built from the `api` and `channel` sections.
pub struct LineClientBuilder {
    loader: ConfigLoader,
    config: Option<LinebotConfig>,
    api: Option<BoxedApi>,
    store: Option<BoxedStore>,
    init_logging: bool,
}

impl Default for LineClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClientBuilder {
    /// Creates a builder.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            api: None,
            store: None,
            init_logging: true,
        }
    }

    /// Loads this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Adds a configuration search path.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    /// Ignores `LINEBOT_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Overrides one dotted configuration key.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.loader = self.loader.set(key, value);
        self
    }

    /// Uses this configuration as-is, skipping the loader.
    pub fn config(mut self, config: LinebotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses a custom platform API.
    pub fn api(mut self, api: BoxedApi) -> Self {
        self.api = Some(api);
        self
    }

    /// Uses a custom store instead of a fresh [`MemoryStore`].
    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether to install the logging subscriber (default: true).
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Loads, validates and assembles the client.
    pub fn build(self) -> RuntimeResult<LineClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        validate_config(&config)?;

        let api: BoxedApi = match self.api {
            Some(api) => api,
            None => Arc::new(
                HttpLineApi::builder(config.channel.access_token.clone())
                    .api_base(config.api.base_url.clone())
                    .data_base(config.api.data_url.clone())
                    .timeout(config.api.timeout())
                    .build()?,
            ),
        };
        let store = self.store.unwrap_or_else(MemoryStore::shared);
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&store))
                .with_handler_timeout(config.dispatch.handler_timeout()),
        );

        info!(
            addr = %config.server.addr(),
            path = %config.server.path,
            fetch_profile = config.dispatch.fetch_profile,
            handler_timeout_ms = config.dispatch.handler_timeout_ms,
            "LINE client created"
        );

        Ok(LineClient {
            config,
            api,
            store,
            dispatcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use linebot_core::WebhookPayload;
    use linebot_core::testing::{MockApi, text_event};
    use linebot_framework::{ArgType, Command, EventContext, RegistryError};

    use super::*;
    use crate::error::RuntimeError;

    fn config() -> LinebotConfig {
        let mut config = LinebotConfig::default();
        config.channel.secret = "secret".into();
        config.channel.access_token = "token".into();
        config.server.host = "127.0.0.1".into();
        config
    }

    fn client(api: &Arc<MockApi>) -> LineClient {
        LineClient::builder()
            .config(config())
            .api(api.clone())
            .init_logging(false)
            .build()
            .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = LineClient::builder()
            .config(LinebotConfig::default())
            .init_logging(false)
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn dispatch_settings_are_applied() {
        let api = MockApi::shared();
        let mut config = config();
        config.dispatch.handler_timeout_ms = 0;
        let client = LineClient::builder()
            .config(config)
            .api(api)
            .init_logging(false)
            .build()
            .unwrap();
        assert_eq!(client.dispatcher().handler_timeout(), None);
    }

    #[tokio::test]
    async fn echo_and_commands_through_the_pipeline() {
        let api = MockApi::shared();
        let client = client(&api);
        client
            .on(EventKind::Text, |ctx: EventContext| async move {
                if let Some(text) = ctx.text().filter(|t| !t.starts_with('!')) {
                    let reply = format!("echo: {text}");
                    ctx.reply(reply).await?;
                }
                anyhow::Ok(())
            })
            .unwrap();
        client
            .add_commands(
                CommandGroup::new("!").command(
                    Command::new("double")
                        .param("n", ArgType::Int)
                        .handler(|ctx, args| async move {
                            let n = args.int("n").unwrap_or_default();
                            ctx.reply((n * 2).to_string()).await?;
                            anyhow::Ok(())
                        }),
                ),
            )
            .unwrap();

        let payload = WebhookPayload {
            destination: "Ubot".into(),
            events: vec![text_event("hello", "U1"), text_event("!double 21", "U2")],
        };
        let reports = client.pipeline().process(payload).await;
        assert_eq!(reports.len(), 2);

        let mut texts = api.replied_texts();
        texts.sort();
        assert_eq!(texts, ["42", "echo: hello"]);
    }

    #[tokio::test]
    async fn run_until_seals_the_registry() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let api = MockApi::shared();
        let mut config = config();
        config.server.port = port;
        let client = LineClient::builder()
            .config(config)
            .api(api)
            .init_logging(false)
            .build()
            .unwrap();

        let ready = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ready);
        client
            .on_ready(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .unwrap();

        client.run_until(async {}).await.unwrap();

        let late = client.on(EventKind::Follow, || async { anyhow::Ok(()) });
        assert!(matches!(
            late,
            Err(RuntimeError::Registry(RegistryError::Sealed))
        ));
        assert_eq!(ready.load(Ordering::SeqCst), 0);
    }
}
