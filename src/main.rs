//! libris CLI: personal book catalog manager.

use std::io::Write as _;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use libris::catalog::Catalog;
use libris::client::{self, ServerState, StartOutcome};
use libris::config::Config;
use libris::model::{Book, BookPatch, NewBook};
use libris::paths::LibrisPaths;
use libris::store::BookStore;

#[derive(Parser)]
#[command(name = "libris", version, about = "Personal book catalog manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all books in the catalog.
    #[command(visible_alias = "ls")]
    List {
        /// Sort order for the table.
        #[arg(long, value_enum, default_value_t = SortKey::Added)]
        sort: SortKey,
    },

    /// Add a book to the catalog.
    Add {
        /// Book title.
        #[arg(long)]
        title: String,

        /// Author name.
        #[arg(long)]
        author: String,

        /// ISBN (must be unique across the catalog).
        #[arg(long)]
        isbn: Option<String>,

        /// Publication year.
        #[arg(long)]
        year: Option<i32>,

        /// Genre label.
        #[arg(long)]
        genre: Option<String>,
    },

    /// Show full details of one book.
    View {
        /// Book id.
        id: i64,
    },

    /// Update fields of an existing book; omitted flags keep their value.
    Update {
        /// Book id.
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        isbn: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        genre: Option<String>,
    },

    /// Delete a book and its registered files.
    #[command(visible_alias = "rm")]
    Delete {
        /// Book id.
        id: i64,

        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Search titles, authors and genres.
    Search {
        /// Case-insensitive substring to look for.
        query: String,
    },

    /// Show catalog statistics.
    Stats,

    /// Manage the librisd API server.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortKey {
    /// Most recently added first (store order).
    Added,
    /// Title, case-insensitive.
    Title,
    /// Author, case-insensitive.
    Author,
    /// Publication year, oldest first; books without a year go last.
    Year,
}

#[derive(Subcommand)]
enum ServerAction {
    /// Start librisd (foreground unless --daemon).
    Start {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,

        /// Detach and append logs to the state directory.
        #[arg(long)]
        daemon: bool,
    },
    /// Ask a running server to shut down.
    Stop,
    /// Report whether the server is running and healthy.
    Status,
    /// Stop the server if running, then start a fresh daemonised one.
    Restart {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the tail of the daemon log.
    Logs {
        /// Number of lines to print.
        #[arg(long, default_value = "20")]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = LibrisPaths::resolve()?;
    paths.ensure_dirs()?;

    match cli.command {
        Commands::List { sort } => {
            let catalog = open_catalog(&paths)?;
            let mut books = catalog.list_books().await?;
            if books.is_empty() {
                println!("No books in the catalog yet.");
            } else {
                sort_books(&mut books, sort);
                print_book_table(&books);
            }
        }

        Commands::Add {
            title,
            author,
            isbn,
            year,
            genre,
        } => {
            let catalog = open_catalog(&paths)?;
            let book = catalog
                .add_book(NewBook {
                    title,
                    author,
                    isbn,
                    published_year: year,
                    genre,
                })
                .await?;
            println!("Added \"{}\" by {} (id {})", book.title, book.author, book.id);
        }

        Commands::View { id } => {
            let catalog = open_catalog(&paths)?;
            let book = catalog.view_book(id).await?;
            print_book_details(&book);
        }

        Commands::Update {
            id,
            title,
            author,
            isbn,
            year,
            genre,
        } => {
            let patch = BookPatch {
                title,
                author,
                isbn,
                published_year: year,
                genre,
            };
            if patch.is_empty() {
                miette::bail!("nothing to update; pass at least one field flag");
            }
            let catalog = open_catalog(&paths)?;
            let book = catalog.change_book(id, patch).await?;
            println!("Updated \"{}\" (id {})", book.title, book.id);
        }

        Commands::Delete { id, force } => {
            let catalog = open_catalog(&paths)?;
            let book = catalog.view_book(id).await?;
            if !force {
                let prompt = format!("Delete \"{}\" by {}? [y/N] ", book.title, book.author);
                if !confirm(&prompt)? {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let removed = catalog.remove_book(id).await?;
            println!("Deleted \"{}\" by {}", removed.title, removed.author);
        }

        Commands::Search { query } => {
            let catalog = open_catalog(&paths)?;
            let books = catalog.find_books(&query).await?;
            if books.is_empty() {
                println!("No books match \"{query}\"");
            } else {
                print_book_table(&books);
            }
        }

        Commands::Stats => {
            let catalog = open_catalog(&paths)?;
            let stats = catalog.stats().await?;
            println!("Total books: {}", stats.total);
            if !stats.genres.is_empty() {
                println!();
                println!("By genre:");
                let width = stats.genres.iter().map(|g| g.genre.len()).max().unwrap_or(0);
                for entry in &stats.genres {
                    println!("  {:<width$}  {}", entry.genre, entry.count);
                }
            }
        }

        Commands::Server { action } => run_server_action(&paths, action)?,
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Server subcommands
// ---------------------------------------------------------------------------

fn run_server_action(paths: &LibrisPaths, action: ServerAction) -> Result<()> {
    match action {
        ServerAction::Start { port, daemon } => {
            if daemon {
                report_start(client::start_daemon(paths, port)?);
            } else {
                let code = client::start_foreground(paths, port)?;
                if code != 0 {
                    std::process::exit(code);
                }
            }
        }

        ServerAction::Stop => {
            let info = client::stop_server(paths)?;
            if client::wait_for_exit(info.pid, std::time::Duration::from_secs(5)) {
                println!("librisd stopped (pid {})", info.pid);
            } else {
                println!("Sent SIGTERM to pid {}; it has not exited yet", info.pid);
            }
        }

        ServerAction::Status => match client::server_state(paths) {
            ServerState::Stopped => println!("librisd is not running"),
            ServerState::Unresponsive(info) => println!(
                "librisd (pid {}) is alive but not answering at {}",
                info.pid,
                info.base_url()
            ),
            ServerState::Running(info) => {
                println!("librisd running (pid {}) at {}", info.pid, info.base_url())
            }
        },

        ServerAction::Restart { port } => {
            report_start(client::restart_server(paths, port)?);
        }

        ServerAction::Logs { lines } => {
            for line in client::tail_log(paths, lines)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn report_start(outcome: StartOutcome) {
    match outcome {
        StartOutcome::Ready(info) => {
            println!("librisd running (pid {}) at {}", info.pid, info.base_url());
        }
        StartOutcome::Pending { pid } => {
            println!("librisd spawned (pid {pid}) but has not reported healthy yet");
            println!("Check `libris server logs` if it stays down.");
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn open_catalog(paths: &LibrisPaths) -> Result<Catalog> {
    let config = Config::load_or_default(&paths.config_file())?;
    let store = BookStore::open(config.database_path(&paths.data_dir))?;
    Ok(Catalog::new(store))
}

fn sort_books(books: &mut [Book], sort: SortKey) {
    match sort {
        // Store order is already newest-first.
        SortKey::Added => {}
        SortKey::Title => books.sort_by_key(|b| b.title.to_lowercase()),
        SortKey::Author => books.sort_by_key(|b| b.author.to_lowercase()),
        SortKey::Year => books.sort_by_key(|b| (b.published_year.is_none(), b.published_year)),
    }
}

fn print_book_table(books: &[Book]) {
    println!(
        "{:<5} {:<32} {:<24} {:<6} {}",
        "ID", "Title", "Author", "Year", "Genre"
    );
    for book in books {
        let year = book
            .published_year
            .map_or_else(|| "-".to_string(), |y| y.to_string());
        println!(
            "{:<5} {:<32} {:<24} {:<6} {}",
            book.id,
            book.title,
            book.author,
            year,
            book.genre.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("{} book(s)", books.len());
}

fn print_book_details(book: &Book) {
    let year = book
        .published_year
        .map_or_else(|| "-".to_string(), |y| y.to_string());
    println!("Id:       {}", book.id);
    println!("Title:    {}", book.title);
    println!("Author:   {}", book.author);
    println!("ISBN:     {}", book.isbn.as_deref().unwrap_or("-"));
    println!("Year:     {year}");
    println!("Genre:    {}", book.genre.as_deref().unwrap_or("-"));
    println!("Added:    {}", book.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:  {}", book.updated_at.format("%Y-%m-%d %H:%M"));
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush().into_diagnostic()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).into_diagnostic()?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
