// Command line front end for the admin dashboard

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dashboard_core::auth::{decide_for, Credentials, GuardDecision, Session};
use dashboard_core::changelog::{ChangelogCategory, ChangelogFilter, NewChangelogEntry};
use dashboard_core::mock_api::{CustomerStatus, CustomerUpdate};
use dashboard_core::routes::TracingNavigator;
use dashboard_core::tables::{CustomerRow, EnrichmentUpdate, RowExtra};
use dashboard_core::validation::{
    FeedbackForm, NewCustomer, NewUser, PasswordChangeForm, SignupForm,
};
use dashboard_core::{Config, Dashboard};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Admin dashboard client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
        #[arg(long)]
        accept_terms: bool,
    },

    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    Signout,

    /// Show the current session
    Whoami,

    /// List selectable avatars
    Avatars,

    SetAvatar { avatar: String },

    CompleteOnboarding,

    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },

    /// Show what the route guard decides for a path
    Guard { path: String },

    /// List customers from the configured source
    Customers {
        /// Fetch activity data row by row after loading
        #[arg(long)]
        enrich: bool,
    },

    /// Add a customer to the configured source
    AddCustomer {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// e.g. "🇺🇸 New York, US"
        #[arg(long)]
        location: String,
    },

    UpdateCustomer {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
    },

    DeleteCustomer { id: String },

    /// Search customers by name, email or location
    SearchCustomers { query: String },

    /// List registered accounts (admin)
    Users,

    /// Create an account (admin)
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        disabled: bool,
    },

    /// Submit feedback, or list it (admin) when no rating is given
    Feedback {
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long, default_value = "")]
        message: String,
    },

    Changelog {
        /// All, Announcements, Bug Fix, Product or Exciting News
        #[arg(long, default_value = "All")]
        filter: String,
    },

    AddChangelog {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "Announcement")]
        category: String,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        author: String,
        /// Use \n to separate paragraphs
        #[arg(long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dashboard_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let dashboard = Dashboard::from_config(config, Arc::new(TracingNavigator))
        .await
        .context("Failed to start dashboard")?;
    dashboard.session.bootstrap().await;

    run(cli.command, &dashboard).await
}

async fn run(command: Commands, dashboard: &Dashboard) -> Result<()> {
    let session = &dashboard.session;

    match command {
        Commands::Signup {
            name,
            email,
            password,
            confirm_password,
            accept_terms,
        } => {
            let form = SignupForm {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                accept_terms,
            };
            let created = session.signup(&form).await?;
            println!("{} Signed up as {}", "✓".green(), created.display_name.bold());
        }

        Commands::Signin { email, password } => {
            let signed_in = session.signin(&Credentials::new(email, password)).await?;
            println!("{} Signed in as {}", "✓".green(), signed_in.display_name.bold());
        }

        Commands::Signout => {
            session.signout().await?;
            println!("{} Signed out", "✓".green());
        }

        Commands::Whoami => match session.session() {
            Some(current) => print_session(&current),
            None => println!("{}", "Not signed in".dimmed()),
        },

        Commands::Avatars => {
            for avatar in session.list_avatars().await? {
                println!("{avatar}");
            }
        }

        Commands::SetAvatar { avatar } => {
            let updated = session.change_avatar(&avatar).await?;
            print_session(&updated);
        }

        Commands::CompleteOnboarding => {
            session.complete_onboarding().await?;
            println!("{} Onboarding complete", "✓".green());
        }

        Commands::ChangePassword {
            current,
            new,
            confirm,
        } => {
            session
                .change_password(&PasswordChangeForm {
                    current_password: current,
                    new_password: new,
                    confirm_password: confirm,
                })
                .await?;
            println!("{} Password changed", "✓".green());
        }

        Commands::Guard { path } => match decide_for(&session.state(), &path) {
            GuardDecision::Loading => println!("loading"),
            GuardDecision::Render => println!("render {path}"),
            GuardDecision::RedirectToSignin { from } => {
                println!("redirect /signin (return to {from})")
            }
            GuardDecision::RedirectHome => println!("redirect /"),
        },

        Commands::Customers { enrich } => {
            let table = dashboard.customers_table();
            table.load().await?;
            let rows = table.rows().await;
            println!(
                "{} {}",
                "Customers".bold(),
                format!("({} via {})", rows.len(), table.source_name()).dimmed()
            );
            for row in &rows {
                print_customer(row);
            }

            if enrich {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let enricher = dashboard.enricher();
                let printer = async {
                    while let Some(update) = rx.recv().await {
                        print_enrichment(&update);
                    }
                };
                let (delivered, ()) = tokio::join!(table.enrich(&enricher, tx), printer);
                delivered?;
            }
        }

        Commands::AddCustomer {
            name,
            email,
            location,
        } => {
            let store = dashboard.customer_store()?;
            let id = store
                .add(&NewCustomer {
                    name,
                    email,
                    location,
                })
                .await?;
            match id {
                Some(id) => println!("{} Customer added ({id})", "✓".green()),
                None => println!("{} Customer added to {}", "✓".green(), store.name()),
            }
        }

        Commands::UpdateCustomer {
            id,
            name,
            email,
            location,
            status,
        } => {
            let status: Option<CustomerStatus> = match status.map(|s| s.parse()).transpose() {
                Ok(status) => status,
                Err(e) => bail!(e),
            };
            dashboard
                .customer_store()?
                .update(
                    &id,
                    &CustomerUpdate {
                        name,
                        email,
                        location,
                        status,
                    },
                )
                .await?;
            println!("{} Customer {id} updated", "✓".green());
        }

        Commands::DeleteCustomer { id } => {
            dashboard.customer_store()?.delete(&id).await?;
            println!("{} Customer {id} deleted", "✓".green());
        }

        Commands::SearchCustomers { query } => {
            let hits = dashboard.customer_store()?.search(&query).await?;
            if hits.is_empty() {
                println!("{}", format!("No customers match \"{query}\"").dimmed());
            }
            for row in &hits {
                print_customer(row);
            }
        }

        Commands::Users => {
            let table = dashboard.users_table();
            table.load().await?;
            for row in table.rows().await {
                let onboarding = match row.onboarding_completed {
                    Some(true) => "onboarded".green(),
                    _ => "pending".yellow(),
                };
                println!("{:<16} {:<32} {}", row.id, row.email, onboarding);
            }
        }

        Commands::AddUser {
            username,
            email,
            password,
            full_name,
            disabled,
        } => {
            let created = session
                .create_user(&NewUser {
                    username,
                    email,
                    password,
                    full_name,
                    disabled,
                    avatar: None,
                })
                .await?;
            println!("{} Created {}", "✓".green(), created.username.bold());
        }

        Commands::Feedback { rating, message } => match rating {
            Some(rating) => {
                let id = dashboard
                    .feedback
                    .submit(&FeedbackForm { rating, message })
                    .await?;
                println!("{} Feedback submitted ({id})", "✓".green());
            }
            None => {
                let table = dashboard.feedback_table();
                table.load().await?;
                for entry in table.rows().await {
                    println!(
                        "{} {} {}\n    {}",
                        entry.stars().yellow(),
                        entry.username.bold(),
                        entry.timestamp.dimmed(),
                        entry.message
                    );
                }
            }
        },

        Commands::Changelog { filter } => {
            let filter: ChangelogFilter = match filter.parse() {
                Ok(filter) => filter,
                Err(e) => bail!(e),
            };
            for entry in dashboard.changelog.entries(filter).await {
                println!(
                    "{} {} {}",
                    entry.date.to_string().dimmed(),
                    format!("[{}]", entry.category).cyan(),
                    entry.title.bold()
                );
                for paragraph in &entry.body {
                    println!("    {paragraph}");
                }
                println!("    {}", format!("by {}", entry.author.name).dimmed());
            }
        }

        Commands::AddChangelog {
            title,
            category,
            date,
            author,
            body,
        } => {
            let category: ChangelogCategory = match category.parse() {
                Ok(category) => category,
                Err(e) => bail!(e),
            };
            let entry = dashboard
                .changelog
                .add(&NewChangelogEntry {
                    title,
                    category,
                    date: date.unwrap_or_else(|| Utc::now().date_naive()),
                    author,
                    body: body.replace("\\n", "\n"),
                })
                .await?;
            println!("{} Added \"{}\"", "✓".green(), entry.title);
        }
    }

    Ok(())
}

fn print_session(session: &Session) {
    println!("{} <{}>", session.display_name.bold(), session.email);
    println!("  identity:   {}", session.identity);
    println!("  role:       {}", session.role);
    println!(
        "  avatar:     {}",
        session
            .avatar_url()
            .unwrap_or_else(|| format!("(initial {})", session.initial()))
    );
    println!(
        "  onboarding: {}",
        if session.onboarding_complete {
            "complete"
        } else {
            "pending"
        }
    );
}

fn print_customer(row: &CustomerRow) {
    println!(
        "{:<6} {:<22} {:<32} {:<22} {:>6} {:>12}",
        row.id, row.name, row.email, row.location, row.orders, row.spent
    );
}

fn print_enrichment(update: &EnrichmentUpdate<RowExtra>) {
    match &update.result {
        Ok(extra) => println!(
            "{:>3} {:<6} score {:>3}  {:<8}  last {}",
            update.index + 1,
            update.id,
            extra.score,
            extra.status,
            extra.last_activity
        ),
        Err(e) => println!(
            "{:>3} {:<6} {}",
            update.index + 1,
            update.id,
            e.to_string().red()
        ),
    }
}
