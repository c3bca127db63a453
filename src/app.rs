use crate::completion::{Completion, GeminiClient};
use crate::config::{AppConfig, HTTPConfig};
use crate::http::create_app;
use crate::relay::engine::ProtocolEngine;
use crate::relay::MessagingAdapter;
use crate::session::{Credential, SessionState};
use crate::TracingReloadHandle;
use anyhow::Result;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::log::{error, info, warn};

pub struct AppHandles {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}
impl AppHandles {
    pub async fn new(
        config: AppConfig,
        tracing_reload: TracingReloadHandle,
        allow_prompt: bool,
    ) -> Result<AppHandles> {
        let mut tasks = Vec::new();

        let initial = match config.gemini.api_key.as_deref().map(Credential::parse) {
            Some(Ok(credential)) => Some(credential),
            Some(Err(e)) => {
                warn!("Ignoring configured GEMINI_API_KEY: {e}");
                None
            }
            None => None,
        };
        let session = Arc::new(SessionState::new(initial));

        let completion: Arc<dyn Completion> =
            Arc::new(GeminiClient::new(&config.gemini, Arc::clone(&session))?);
        let adapter = MessagingAdapter::new(
            Arc::clone(&session),
            Self::create_engine(&config),
            completion,
        );

        let http_handle = Self::start_http_server(
            config.http,
            Arc::clone(&session),
            adapter.clone(),
            tracing_reload,
        );
        tasks.push(("HTTP Server", http_handle));

        if session.has_credential().await {
            // A startup failure is logged and can be retried through /setup.
            let _ = adapter.start().await;
        } else if allow_prompt && std::io::stdin().is_terminal() {
            tokio::spawn(Self::prompt_for_key(session, adapter));
        } else {
            warn!("No GEMINI_API_KEY configured, submit one through /setup to start the relay");
        }

        Ok(AppHandles { tasks })
    }

    pub async fn run(self) {
        let futures: Vec<_> = self
            .tasks
            .into_iter()
            .map(|(name, handle)| {
                info!("Starting task: {name}");
                Box::pin(async move {
                    match handle.await {
                        Ok(_) => error!("{name} task completed!"),
                        Err(e) => error!("{name} task failed: {e:?}!"),
                    }
                })
            })
            .collect();

        // Wait for any task to complete. All handles are boxed, so when dropped they are cancelled.
        let (_, _, remaining) = futures::future::select_all(futures).await;
        drop(remaining);
    }

    #[cfg(feature = "whatsapp-web")]
    fn create_engine(config: &AppConfig) -> Arc<dyn ProtocolEngine> {
        Arc::new(crate::relay::whatsapp::WhatsAppWebEngine::new(
            &config.whatsapp,
        ))
    }

    #[cfg(not(feature = "whatsapp-web"))]
    fn create_engine(_config: &AppConfig) -> Arc<dyn ProtocolEngine> {
        Arc::new(crate::relay::engine::UnavailableEngine)
    }

    /// Asks the operator for the key once on the terminal. `/setup` keeps working meanwhile.
    async fn prompt_for_key(session: Arc<SessionState>, adapter: MessagingAdapter) {
        info!("No GEMINI_API_KEY configured. Paste it below and press Enter (or use /setup):");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) => {
                warn!("Terminal closed, submit the key through /setup instead");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read key from terminal: {e}");
                return;
            }
        }

        if session.is_relay_running() {
            info!("Relay already started through /setup, ignoring terminal input");
            return;
        }
        if let Err(e) = session.set_credential(&line).await {
            warn!("Invalid key entered on terminal: {e}. Submit one through /setup instead");
            return;
        }

        let _ = adapter.start().await;
    }

    fn start_http_server(
        config: HTTPConfig,
        session: Arc<SessionState>,
        adapter: MessagingAdapter,
        tracing_reload: TracingReloadHandle,
    ) -> JoinHandle<()> {
        let address = config.address;
        let tls_config = config.tls;

        let app = create_app(session, adapter, tracing_reload);
        tokio::spawn(async move {
            let result = match tls_config {
                Some(_tls_config) => {
                    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
                    {
                        info!("Starting HTTPS (secure) server on {address}");

                        #[cfg(feature = "tls-rustls")]
                        {
                            let _ = rustls::crypto::CryptoProvider::install_default(
                                rustls::crypto::aws_lc_rs::default_provider(),
                            );
                            match axum_server::tls_rustls::RustlsConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            )
                            .await
                            {
                                Ok(tls) => axum_server::bind_rustls(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::anyhow!(
                                    "Failed to load rustls TLS certificates: {e}"
                                )),
                            }
                        }

                        #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                        {
                            match axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            ) {
                                Ok(tls) => axum_server::bind_openssl(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::anyhow!(
                                    "Failed to load openssl TLS certificates: {e}"
                                )),
                            }
                        }
                    }

                    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                    Err(anyhow::anyhow!(
                        "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                    ))
                }
                None => {
                    info!("Starting HTTP (insecure) server on {address}");
                    axum_server::bind(address)
                        .serve(app.into_make_service())
                        .await
                        .map_err(anyhow::Error::from)
                }
            };

            if let Err(e) = result {
                error!("Server error: {e:?}");
            }
        })
    }
}
