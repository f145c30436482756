use super::{
    Cli,
    commands::{AdaptersCommand, Command, SessionsCommand},
};
use crate::adapters::{AdapterRegistry, mock_adapter};
use crate::auth::{self, AuthFlow, LoginOutcome, LoginStrategy};
use crate::browser::BrowserSupervisor;
use crate::output::{self, TableBuilder, text};
use crate::scrape::{ScrapeRequest, Scraper};
use crate::server::HttpServer;
use crate::session::SessionStore;
use crate::{Config, Result, ScraperError};
use std::collections::HashMap;
use std::sync::Arc;

pub async fn dispatch(mut cli: Cli, config: Arc<Config>) -> Result<()> {
    let command = match cli.command.take() {
        Some(cmd) => cmd,
        None => {
            eprintln!("No command provided. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let supervisor = Arc::new(BrowserSupervisor::new(config.clone()));
    let sessions = Arc::new(SessionStore::open(&config)?);
    let adapters = Arc::new(AdapterRegistry::open(&config)?);
    let scraper = Arc::new(Scraper::new(supervisor.clone(), sessions.clone(), &config));
    let auth = Arc::new(AuthFlow::new(supervisor.clone(), sessions.clone(), &config));

    let result = run_command(
        command, &cli, &config, &scraper, &auth, &adapters, &sessions,
    )
    .await;

    // Whatever happened above, the browser does not outlive the command.
    supervisor.shutdown().await;

    result
}

#[allow(clippy::too_many_arguments)]
async fn run_command(
    command: Command,
    cli: &Cli,
    config: &Arc<Config>,
    scraper: &Arc<Scraper>,
    auth: &Arc<AuthFlow>,
    adapters: &Arc<AdapterRegistry>,
    sessions: &Arc<SessionStore>,
) -> Result<()> {
    match command {
        Command::Serve => {
            let server = HttpServer::new(
                config.server.host.clone(),
                config.server.port,
                scraper.clone(),
                auth.clone(),
                adapters.clone(),
                sessions.clone(),
            );

            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    Ok(())
                }
            }
        }

        Command::Scrape {
            url,
            selector,
            script,
            html,
            session,
            wait_ms,
            user_agent,
            headers,
            interactive,
        } => {
            let mut request = ScrapeRequest::new(url);
            request.wait_for_selector = selector;
            request.script = script;
            request.return_html = html;
            request.session = session;
            request.wait_for_timeout = wait_ms;
            request.user_agent = user_agent;
            request.interactive = interactive;
            if !headers.is_empty() {
                request.headers = Some(parse_header_args(&headers)?);
            }

            let result = scraper.scrape(&request).await?;
            output::print_output(&result, cli.json, true)
        }

        Command::Profile {
            platform,
            id,
            followers,
            following,
        } => {
            let adapter = adapters
                .get(&platform)?
                .ok_or_else(|| ScraperError::UnknownPlatform(platform.clone()))?;

            let timeout_ms = config.scrape.navigation_timeout_ms;
            let request = if followers {
                adapter.followers_request(&id, timeout_ms).ok_or_else(|| {
                    ScraperError::InvalidAdapter(format!("{platform} has no followers template"))
                })?
            } else if following {
                adapter.following_request(&id, timeout_ms).ok_or_else(|| {
                    ScraperError::InvalidAdapter(format!("{platform} has no following template"))
                })?
            } else {
                adapter.profile_request(&id, timeout_ms)
            };

            let result = scraper.scrape(&request).await?;
            output::print_output(&result, cli.json, true)
        }

        Command::Login {
            platform,
            wait_close,
        } => {
            let strategy = if wait_close {
                LoginStrategy::WindowClose
            } else {
                LoginStrategy::UrlPoll
            };

            if !cli.json {
                println!(
                    "{}",
                    text::info("A browser window will open; log in there.")
                );
            }

            let outcome = if auth::platform(&platform).is_some() {
                auth.start_login(&platform, strategy).await?
            } else if let Some(login_url) = adapters.get(&platform)?.and_then(|a| a.login_url) {
                // Adapter-defined platforms have no success-URL pattern, so
                // the window close is the completion signal.
                let mut request = ScrapeRequest::new(login_url);
                request.interactive = true;
                request.session = Some(platform.clone());
                scraper.scrape(&request).await?;

                if sessions.has(&platform) {
                    LoginOutcome {
                        ok: true,
                        message: "Session saved.".to_string(),
                    }
                } else {
                    LoginOutcome {
                        ok: false,
                        message: "Window closed before any session state was captured."
                            .to_string(),
                    }
                }
            } else {
                return Err(ScraperError::UnknownPlatform(platform));
            };

            output::print_output(&outcome, cli.json, true)
        }

        Command::Logout { platform } => {
            let existed = auth.logout(&platform)?;
            if cli.json {
                println!("{}", output::to_json(&serde_json::json!({ "ok": existed }), true)?);
            } else if existed {
                println!("{}", text::success(&format!("Logged out of {platform}")));
            } else {
                println!("{}", text::info(&format!("No saved session for {platform}")));
            }
            Ok(())
        }

        Command::Sessions { subcommand } => match subcommand {
            SessionsCommand::List => {
                let names = sessions.list()?;
                if cli.json {
                    println!("{}", output::to_json(&names, true)?);
                } else if names.is_empty() {
                    println!("{}", text::info("No saved sessions"));
                } else {
                    let mut table = TableBuilder::new()
                        .headers(vec!["Session".to_string(), "Saved".to_string()]);
                    for name in names {
                        let saved = sessions
                            .load(&name)?
                            .map(|s| s.saved_at.format("%Y-%m-%d %H:%M UTC").to_string())
                            .unwrap_or_else(|| "unreadable".to_string());
                        table = table.row(vec![name, saved]);
                    }
                    print!("{}", table.build());
                }
                Ok(())
            }
            SessionsCommand::Delete { name } => {
                if sessions.delete(&name)? {
                    println!("{}", text::success(&format!("Deleted session {name}")));
                } else {
                    println!("{}", text::info(&format!("No session named {name}")));
                }
                Ok(())
            }
        },

        Command::Adapters { subcommand } => match subcommand {
            AdaptersCommand::List => {
                let list = adapters.list()?;
                if cli.json {
                    println!("{}", output::to_json(&list, true)?);
                } else if list.is_empty() {
                    println!("{}", text::info("No adapters installed"));
                } else {
                    let mut table = TableBuilder::new().headers(vec![
                        "Platform".to_string(),
                        "Name".to_string(),
                        "Profile URL".to_string(),
                    ]);
                    for adapter in list {
                        table = table.row(vec![
                            adapter.platform,
                            adapter.name.unwrap_or_default(),
                            text::truncate(&adapter.profile_url_template, 40),
                        ]);
                    }
                    print!("{}", table.build());
                }
                Ok(())
            }
            AdaptersCommand::Show { platform } => {
                let adapter = adapters
                    .get(&platform)?
                    .ok_or_else(|| ScraperError::UnknownPlatform(platform))?;
                println!("{}", output::to_json(&adapter, true)?);
                Ok(())
            }
            AdaptersCommand::Save { file } => {
                let content = std::fs::read_to_string(&file)?;
                let adapter: crate::adapters::AdapterConfig = serde_json::from_str(&content)?;
                adapters.save(&adapter)?;
                println!(
                    "{}",
                    text::success(&format!("Installed adapter {}", adapter.platform))
                );
                Ok(())
            }
            AdaptersCommand::Init => {
                let adapter = mock_adapter();
                adapters.save(&adapter)?;
                println!(
                    "{}",
                    text::success(&format!("Installed adapter {}", adapter.platform))
                );
                Ok(())
            }
        },
    }
}

/// Parse repeated `--header 'Name: value'` arguments.
fn parse_header_args(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();

    for entry in raw {
        let (name, value) = entry.split_once(':').ok_or_else(|| {
            ScraperError::General(format!("invalid header {entry:?}, expected 'Name: value'"))
        })?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_args() {
        let headers = parse_header_args(&[
            "Accept-Language: en-US".to_string(),
            "X-Custom:1".to_string(),
        ])
        .unwrap();

        assert_eq!(headers["Accept-Language"], "en-US");
        assert_eq!(headers["X-Custom"], "1");
    }

    #[test]
    fn test_parse_header_args_rejects_missing_colon() {
        assert!(parse_header_args(&["not-a-header".to_string()]).is_err());
    }
}
