use reschedule_notifier::events::RescheduleEvent;
use reschedule_notifier::state::{AppState, Config};
use reschedule_notifier::task::{InMemoryTaskRepository, Task};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reschedule_notifier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let repository = load_tasks()?;
    tracing::info!("Loaded {} tasks", repository.len());

    let state = AppState::build(config, repository);

    let notifier = state.notifier.clone();
    let events = state.bus.subscribe();
    let notifier_task = tokio::spawn(async move { notifier.run(events).await });

    let mut toasts = state.toast_host.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = toasts.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Could not encode toast event: {:?}", e),
            }
        }
    });

    tracing::info!("Reading reschedule events from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        dispatch(&state, line.trim());
    }

    if notifier_task.is_finished() {
        if let Err(e) = notifier_task.await {
            tracing::error!("Notifier service error: {:?}", e);
        }
    } else {
        notifier_task.abort();
    }
    state.redelivery.shutdown().await;
    tracing::info!(reported = state.tracker.reported(), "Shutting down");
    Ok(())
}

fn dispatch(state: &AppState, line: &str) {
    match line {
        "" => {}
        "undo" => {
            if !state.toast_host.invoke_action() {
                tracing::info!("Nothing to undo");
            }
        }
        "dismiss" => {
            state.toast_host.dismiss();
        }
        "attach" => state.toast_host.attach(),
        "detach" => state.toast_host.detach(),
        json => match serde_json::from_str::<RescheduleEvent>(json) {
            Ok(event) => {
                state.bus.publish(event);
            }
            Err(e) => tracing::warn!("Ignoring unreadable input {:?}: {}", json, e),
        },
    }
}

fn load_tasks() -> anyhow::Result<InMemoryTaskRepository> {
    let Ok(path) = std::env::var("RESCHEDULE_TASKS_FILE") else {
        return Ok(InMemoryTaskRepository::new());
    };
    let contents = std::fs::read_to_string(&path)?;
    let tasks: Vec<Task> = serde_json::from_str(&contents)?;
    Ok(InMemoryTaskRepository::from_tasks(tasks))
}
