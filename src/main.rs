use clap::{Parser, Subcommand};
use gtasks_connect::{
    Authenticator, DataStore, Error, Task, TasksClient, format_short, parse_due_date,
};

#[derive(Debug, Parser)]
#[command(
    name = "gtasks-connect",
    about = "Manage Google Tasks from the command line. Signs in via OAuth on first use."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive sign-in flow and store credentials.
    Login,
    /// Remove the stored credentials.
    Logout,
    /// Show your task lists and their ids.
    Lists,
    /// Mark a task list as the favorite used by `list` and `add`.
    Favorite { list_id: String },
    /// Show open tasks in the favorite list.
    List,
    /// Add a task to the favorite list.
    Add {
        title: String,
        /// Due date: days from now, MM-DD, or MM-DD-HH:MM.
        #[arg(long)]
        due: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gtasks_connect=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let authenticator = Authenticator::from_env()?;
    let data = DataStore::new();

    match cli.command {
        Command::Login => {
            authenticator.get_authenticated_client().await?;
            println!("Signed in. Credentials stored for future runs.");
        }
        Command::Logout => {
            authenticator.sign_out()?;
            println!("Signed out.");
        }
        Command::Lists => {
            let client = authenticator.get_authenticated_client().await?;
            let mut tasks = TasksClient::new(client);
            for list in tasks.list_task_lists().await? {
                println!("{}  {}", list.id, list.title);
            }
        }
        Command::Favorite { list_id } => {
            data.set_favorite_list_id(&list_id)?;
            println!("Favorite list set to {list_id}.");
        }
        Command::List => {
            let Some(list_id) = data.favorite_list_id() else {
                println!("No favorite list set. Use 'lists' and 'favorite <list-id>' first.");
                return Ok(());
            };
            let client = authenticator.get_authenticated_client().await?;
            let mut tasks = TasksClient::new(client);
            for task in tasks.list_tasks(&list_id).await? {
                if task.is_completed() {
                    continue;
                }
                let title = task.title.as_deref().unwrap_or("No title");
                match task.due.as_deref().and_then(parse_rfc3339_local) {
                    Some(due) => println!("{title}  (due {})", format_short(&due)),
                    None => println!("{title}"),
                }
            }
        }
        Command::Add { title, due } => {
            let Some(list_id) = data.favorite_list_id() else {
                println!("No favorite list set. Use 'lists' and 'favorite <list-id>' first.");
                return Ok(());
            };
            let due = due.as_deref().and_then(parse_due_date);
            let task = Task::needs_action(&title, due.map(|d| d.to_rfc3339()));

            let client = authenticator.get_authenticated_client().await?;
            let mut tasks = TasksClient::new(client);
            tasks.insert_task(&list_id, &task).await?;

            match due {
                Some(due) => println!("Added \"{title}\" due {}.", format_short(&due)),
                None => println!("Added \"{title}\" with no due date."),
            }
        }
    }

    Ok(())
}

fn parse_rfc3339_local(value: &str) -> Option<chrono::DateTime<chrono::Local>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Local))
}
