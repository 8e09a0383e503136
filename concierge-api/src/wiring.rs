use anyhow::Context;
use concierge_booking::{Collaborators, SessionSettings};
use concierge_store::{
    AcceptingContactDesk, BackendClient, ChatCompletionsClient, Config, DeskReservations, Mode, OfflineNlu,
    StaticInventory,
};
use std::sync::Arc;

/// Builds the collaborator set for the configured mode.
pub fn collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    match config.mode {
        Mode::Offline => offline_collaborators(),
        Mode::Live => {
            let timeout = config.orchestration.call_timeout();
            let backend = Arc::new(
                BackendClient::new(&config.backend, &config.orchestration.default_contact_title, timeout)
                    .context("building backend client")?,
            );
            let nlu = ChatCompletionsClient::new(config.nlu.clone(), timeout).context("building nlu client")?;

            Ok(Collaborators {
                nlu: Arc::new(nlu),
                inventory: backend.clone(),
                reservations: backend.clone(),
                contacts: backend,
            })
        }
    }
}

/// In-process collaborators with a fixed timetable. No network access.
pub fn offline_collaborators() -> anyhow::Result<Collaborators> {
    let nlu = OfflineNlu::new().context("compiling offline patterns")?;
    Ok(Collaborators {
        nlu: Arc::new(nlu),
        inventory: Arc::new(StaticInventory::sample()),
        reservations: Arc::new(DeskReservations::default()),
        contacts: Arc::new(AcceptingContactDesk::default()),
    })
}

pub fn session_settings(config: &Config) -> SessionSettings {
    SessionSettings {
        call_timeout: config.orchestration.call_timeout(),
        max_parallel_items: config.orchestration.max_parallel_items.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_shared::Masked;
    use concierge_store::app_config::{BackendConfig, NluConfig, OrchestrationConfig, ServerConfig};
    use std::time::Duration;

    fn config(mode: Mode, max_parallel_items: usize) -> Config {
        Config {
            server: ServerConfig {
                port: 3000,
                session_idle_secs: 1800,
            },
            nlu: NluConfig {
                base_url: "http://localhost:1/v1".to_string(),
                api_key: Masked::new("sk-test".to_string()),
                model: "gpt-4o".to_string(),
                max_tokens: 256,
            },
            backend: BackendConfig {
                base_url: "http://localhost:1/api".to_string(),
                username: "concierge".to_string(),
                session_id: "00009991".to_string(),
                payment_type: "GUESTCARD".to_string(),
            },
            orchestration: OrchestrationConfig {
                call_timeout_ms: 2500,
                max_parallel_items,
                default_contact_title: "MR.".to_string(),
            },
            mode,
        }
    }

    #[test]
    fn test_both_modes_build() {
        assert!(collaborators(&config(Mode::Offline, 4)).is_ok());
        assert!(collaborators(&config(Mode::Live, 4)).is_ok());
    }

    #[test]
    fn test_session_settings_follow_config() {
        let settings = session_settings(&config(Mode::Offline, 8));
        assert_eq!(settings.call_timeout, Duration::from_millis(2500));
        assert_eq!(settings.max_parallel_items, 8);

        assert_eq!(session_settings(&config(Mode::Offline, 0)).max_parallel_items, 1);
    }
}
