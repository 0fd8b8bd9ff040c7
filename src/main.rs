mod api;
mod app;
mod config;
mod credentials;
mod fallback;
mod pages;
mod query;
mod session;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::api::types::{
  ListingFilters, ListingUpdate, NewListing, ProfileUpdate, PropertyType, RegisterRequest,
};
use crate::app::App;
use crate::session::Route;

#[derive(Parser, Debug)]
#[command(name = "uniboe")]
#[command(about = "Student housing, community feed and chat from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./uniboe.yaml or $XDG_CONFIG_HOME/uniboe/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL
  #[arg(long)]
  api_url: Option<String>,

  /// Keep the session in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in with your university email
  Login {
    email: String,
    #[arg(long)]
    password: String,
  },
  /// Create an account
  Register {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// University domain (default: the email's domain)
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    password: String,
  },
  Logout,
  Whoami,
  /// Confirm your address with the token from the verification email
  VerifyEmail { token: String },
  /// Browse and manage housing listings
  #[command(subcommand)]
  Housing(HousingCommand),
  /// The community feed
  #[command(subcommand)]
  Feed(FeedCommand),
  /// Direct messages
  #[command(subcommand)]
  Chat(ChatCommand),
  /// Ask Olive, the housing assistant
  Ask {
    #[arg(required = true)]
    prompt: Vec<String>,
    /// Continue an earlier conversation
    #[arg(long)]
    conversation: Option<String>,
  },
  /// Past conversations with Olive, or one of them in full
  History { id: Option<String> },
  /// Manage saved conversations with Olive
  #[command(subcommand)]
  Olive(OliveCommand),
  #[command(subcommand)]
  Profile(ProfileCommand),
  #[command(subcommand)]
  Universities(UniversityCommand),
}

impl Command {
  /// The view a command belongs to. Account commands manage navigation themselves.
  fn route(&self) -> Option<Route> {
    match self {
      Command::Housing(_) => Some(Route::Housing),
      Command::Feed(_) => Some(Route::Feed),
      Command::Chat(_) => Some(Route::Chat),
      Command::Ask { .. } | Command::History { .. } | Command::Olive(_) => {
        Some(Route::Assistant)
      }
      Command::Profile(_) => Some(Route::Profile),
      _ => None,
    }
  }
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
  #[arg(long)]
  min_price: Option<f64>,
  #[arg(long)]
  max_price: Option<f64>,
  #[arg(long)]
  bedrooms: Option<u32>,
  #[arg(long = "type")]
  property_type: Option<PropertyType>,
  #[arg(long)]
  city: Option<String>,
  #[arg(long)]
  state: Option<String>,
  #[arg(long)]
  page: Option<u32>,
}

impl From<FilterArgs> for ListingFilters {
  fn from(args: FilterArgs) -> Self {
    Self {
      page: args.page,
      page_size: None,
      min_price: args.min_price,
      max_price: args.max_price,
      bedrooms: args.bedrooms,
      property_type: args.property_type,
      city: args.city,
      state: args.state,
    }
  }
}

#[derive(ClapArgs, Debug)]
struct ListingArgs {
  #[arg(long)]
  title: String,
  #[arg(long)]
  address: String,
  #[arg(long)]
  city: String,
  #[arg(long)]
  state: String,
  #[arg(long)]
  price: f64,
  #[arg(long = "type")]
  property_type: PropertyType,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  zip: Option<String>,
  #[arg(long)]
  bedrooms: Option<u32>,
  #[arg(long)]
  bathrooms: Option<f32>,
  /// May be repeated
  #[arg(long = "amenity")]
  amenities: Vec<String>,
  #[arg(long)]
  email: Option<String>,
  #[arg(long)]
  phone: Option<String>,
}

impl From<ListingArgs> for NewListing {
  fn from(args: ListingArgs) -> Self {
    Self {
      title: args.title,
      description: args.description,
      address: args.address,
      city: args.city,
      state: args.state,
      zip_code: args.zip,
      price: args.price,
      bedrooms: args.bedrooms,
      bathrooms: args.bathrooms,
      property_type: args.property_type,
      amenities: args.amenities,
      images: Vec::new(),
      contact_email: args.email,
      contact_phone: args.phone,
    }
  }
}

#[derive(Subcommand, Debug)]
enum HousingCommand {
  List(FilterArgs),
  Show { id: String },
  Search { query: String },
  /// Your own listings
  Mine,
  Create(ListingArgs),
  Update {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<f64>,
  },
  Delete { id: String },
  /// Make a listing visible again
  Activate { id: String },
  /// Hide a listing without deleting it
  Deactivate { id: String },
  /// Save a listing, or remove it from your saved listings
  Like {
    id: String,
    #[arg(long)]
    undo: bool,
  },
}

#[derive(Subcommand, Debug)]
enum FeedCommand {
  List {
    #[arg(long)]
    page: Option<u32>,
  },
  Show { id: String },
  /// Posts by one user
  User { user_id: String },
  /// Like a post, or unlike it if already liked
  Like { id: String },
  Post {
    #[arg(required = true)]
    content: Vec<String>,
  },
  Comment {
    id: String,
    #[arg(required = true)]
    content: Vec<String>,
  },
  /// Replace the text of one of your posts
  Edit {
    id: String,
    #[arg(required = true)]
    content: Vec<String>,
  },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ChatCommand {
  List,
  Messages { conversation: String },
  Send {
    conversation: String,
    #[arg(required = true)]
    content: Vec<String>,
  },
  /// Find people to message
  Users { query: String },
  /// Open a conversation with a user
  Start { user_id: String },
  Unread,
  /// Search your messages
  Search {
    query: String,
    /// Only within this conversation
    #[arg(long)]
    conversation: Option<String>,
  },
  /// Delete a conversation and all of its messages
  Delete { conversation: String },
}

#[derive(Subcommand, Debug)]
enum OliveCommand {
  Rename {
    id: String,
    #[arg(required = true)]
    title: Vec<String>,
  },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
  /// Your profile, or another user's
  Show { user_id: Option<String> },
  Stats,
  /// Find students by name or university
  Search { query: String },
  Update {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    major: Option<String>,
    #[arg(long)]
    year: Option<u16>,
    /// May be repeated
    #[arg(long = "interest")]
    interests: Vec<String>,
  },
}

#[derive(Subcommand, Debug)]
enum UniversityCommand {
  List,
  Search { query: String },
  /// The university behind an email domain
  Domain { domain: String },
  /// Check whether an address can be used to register
  Check { email: String },
}

/// Log to a daily file so stdout stays clean for command output.
fn init_logging(config: &config::Config) -> Result<WorkerGuard> {
  let dir = config.log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "uniboe.log"));
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn joined(words: Vec<String>) -> String {
  words.join(" ")
}

async fn run(app: &App, command: Command) -> Result<String> {
  if let Some(route) = command.route() {
    if !app.router.current().is_auth() {
      app.router.navigate(route);
    }
  }

  match command {
    Command::Login { email, password } => pages::auth::login(app, &email, &password).await,
    Command::Register {
      name,
      email,
      domain,
      password,
    } => {
      let domain = match domain {
        Some(domain) => domain,
        None => email
          .split_once('@')
          .map(|(_, d)| d.to_string())
          .ok_or_else(|| eyre!("'{}' is not an email address", email))?,
      };
      let request = RegisterRequest {
        full_name: name,
        university_email: email,
        university_domain: domain,
        password,
      };
      pages::auth::register(app, request).await
    }
    Command::Logout => pages::auth::logout(app).await,
    Command::Whoami => pages::auth::whoami(app).await,
    Command::VerifyEmail { token } => pages::auth::verify_email(app, &token).await,

    Command::Housing(cmd) => match cmd {
      HousingCommand::List(filters) => pages::housing::list(app, filters.into()).await,
      HousingCommand::Show { id } => pages::housing::show(app, &id).await,
      HousingCommand::Search { query } => pages::housing::search(app, &query).await,
      HousingCommand::Mine => pages::housing::mine(app).await,
      HousingCommand::Create(listing) => pages::housing::create(app, listing.into()).await,
      HousingCommand::Update {
        id,
        title,
        description,
        price,
      } => {
        let update = ListingUpdate {
          title,
          description,
          price,
          is_active: None,
        };
        pages::housing::update(app, &id, update).await
      }
      HousingCommand::Delete { id } => pages::housing::delete(app, &id).await,
      HousingCommand::Activate { id } => pages::housing::set_active(app, &id, true).await,
      HousingCommand::Deactivate { id } => pages::housing::set_active(app, &id, false).await,
      HousingCommand::Like { id, undo } => pages::housing::like(app, &id, undo).await,
    },

    Command::Feed(cmd) => match cmd {
      FeedCommand::List { page } => pages::feed::list(app, page).await,
      FeedCommand::Show { id } => pages::feed::show(app, &id).await,
      FeedCommand::User { user_id } => pages::feed::by_user(app, &user_id).await,
      FeedCommand::Like { id } => pages::feed::like(app, &id).await,
      FeedCommand::Post { content } => pages::feed::post(app, &joined(content)).await,
      FeedCommand::Comment { id, content } => {
        pages::feed::comment(app, &id, &joined(content)).await
      }
      FeedCommand::Edit { id, content } => pages::feed::edit(app, &id, &joined(content)).await,
      FeedCommand::Delete { id } => pages::feed::delete(app, &id).await,
    },

    Command::Chat(cmd) => match cmd {
      ChatCommand::List => pages::chat::list(app).await,
      ChatCommand::Messages { conversation } => pages::chat::messages(app, &conversation).await,
      ChatCommand::Send {
        conversation,
        content,
      } => pages::chat::send(app, &conversation, &joined(content)).await,
      ChatCommand::Users { query } => pages::chat::users(app, &query).await,
      ChatCommand::Start { user_id } => pages::chat::start(app, &user_id).await,
      ChatCommand::Unread => pages::chat::unread(app).await,
      ChatCommand::Search {
        query,
        conversation,
      } => pages::chat::search(app, &query, conversation.as_deref()).await,
      ChatCommand::Delete { conversation } => pages::chat::delete(app, &conversation).await,
    },

    Command::Ask {
      prompt,
      conversation,
    } => pages::assistant::ask(app, &joined(prompt), conversation.as_deref()).await,
    Command::History { id: None } => pages::assistant::history(app).await,
    Command::History { id: Some(id) } => pages::assistant::conversation(app, &id).await,
    Command::Olive(cmd) => match cmd {
      OliveCommand::Rename { id, title } => {
        pages::assistant::rename(app, &id, &joined(title)).await
      }
      OliveCommand::Delete { id } => pages::assistant::delete(app, &id).await,
    },

    Command::Profile(cmd) => match cmd {
      ProfileCommand::Show { user_id: None } => pages::profile::show(app).await,
      ProfileCommand::Show { user_id: Some(id) } => pages::profile::show_user(app, &id).await,
      ProfileCommand::Stats => pages::profile::stats(app).await,
      ProfileCommand::Search { query } => pages::profile::search(app, &query).await,
      ProfileCommand::Update {
        name,
        bio,
        major,
        year,
        interests,
      } => {
        let update = ProfileUpdate {
          full_name: name,
          bio,
          interests: if interests.is_empty() {
            None
          } else {
            Some(interests)
          },
          major,
          graduation_year: year,
        };
        pages::profile::update(app, update).await
      }
    },

    Command::Universities(cmd) => match cmd {
      UniversityCommand::List => pages::universities::list(app, None).await,
      UniversityCommand::Search { query } => pages::universities::list(app, Some(&query)).await,
      UniversityCommand::Domain { domain } => pages::universities::by_domain(app, &domain).await,
      UniversityCommand::Check { email } => pages::universities::check_email(app, &email).await,
    },
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration; the command line wins over file and environment
  let mut config = config::Config::load(args.config.as_deref())?;
  config.apply_overrides(args.api_url);

  let _log_guard = init_logging(&config)?;

  let app = App::connect(config, args.ephemeral)?;
  let gc = app.start_gc();

  let mut routes = app.router.subscribe();
  tokio::spawn(async move {
    while routes.changed().await.is_ok() {
      let route = routes.borrow().clone();
      debug!(?route, "navigated");
    }
  });

  let output = run(&app, args.command).await;
  gc.abort();

  if let Some(notice) = pages::auth::notice(&app) {
    eprintln!("{}", notice);
  }

  let output = output?;
  if !output.is_empty() {
    println!("{}", output);
  }

  Ok(())
}
