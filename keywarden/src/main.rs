use chrono::Utc;
use keywarden::config::Config;
use keywarden::gpg::GpgClient;
use shared_types::KeyStatusReport;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for the JSON the editor reads.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    let mut config = Config::from_env();
    config.discover_from_repository().await;

    let Some(key_id) = config.key_id.clone() else {
        anyhow::bail!(
            "no signing key configured; set KEYWARDEN_KEY_ID or `git config user.signingkey`"
        );
    };

    let client = GpgClient::new(&config.gpg_program, &config.agent_program);

    match command {
        Some("status") | None => {
            let report = status_report(&client, &config, &key_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some("unlock") => {
            let passphrase = read_passphrase()?;
            client.unlock_key(&key_id, &passphrase).await?;
            tracing::info!(key_id = %key_id, "signing run completed");
            let report = status_report(&client, &config, &key_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(other) => {
            anyhow::bail!("unknown command `{other}`; expected `status` or `unlock`");
        }
    }

    Ok(())
}

async fn status_report(
    client: &GpgClient,
    config: &Config,
    key_id: &str,
) -> anyhow::Result<KeyStatusReport> {
    let key = client.resolve_key(key_id).await?;
    let unlocked = client.is_unlocked(&key.keygrip).await?;
    Ok(KeyStatusReport {
        key_id: key_id.to_string(),
        fingerprint: key.fingerprint,
        keygrip: key.keygrip,
        unlocked,
        signing_required: config.signing_required,
        checked_at: Utc::now(),
    })
}

/// The editor supplies the passphrase over stdin. An empty line is a legal
/// passphrase attempt and is forwarded as-is.
fn read_passphrase() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
