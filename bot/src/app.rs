use crate::{
    board::Board,
    markdown,
    telegram::{
        BotCommand, KeyboardButton, Message, ParseMode, ReplyKeyboardMarkup, TelegramBuilderError,
        TelegramClient, TelegramError, Update,
    },
    Opts,
};
use client::{TransitBuilderError, TransitClient, TransitGateway};
use std::{
    error::Error,
    fmt::Display,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

pub type AppResult<T> = Result<T, AppError>;

pub const SHARE_LOCATION_TEXT: &str = "Please share your location!";
pub const SEND_LOCATION_BUTTON: &str = "📍 Send Location";
pub const MAP_CAPTION: &str = "🚇 Stockholm Train Map";
pub const MAP_MISSING_TEXT: &str = "The train map is not available right now.";
pub const UPSTREAM_ERROR_TEXT: &str =
    "Sorry, I could not reach the departure service. Please try again in a moment.";
pub const SEND_FAILED_TEXT: &str =
    "Sorry, the departures could not be displayed. Please try again in a moment.";

pub struct App<G> {
    gateway: G,
    telegram: TelegramClient,
    max_stops: usize,
    map_path: PathBuf,
    /// Set once `getMe` has answered.
    username: Option<String>,
}

impl App<TransitClient> {
    pub fn from_opts(opts: Opts) -> AppResult<Self> {
        let request_timeout = Duration::from_secs(opts.request_timeout_secs);

        let gateway = TransitClient::new(opts.resrobot_key, opts.trafiklab_key)
            .resrobot_url(opts.resrobot_url)
            .trafiklab_url(opts.trafiklab_url)
            .timeout(request_timeout)
            .build()?;

        let telegram = TelegramClient::new(opts.telegram_token)
            .api_url(opts.telegram_url)
            .request_timeout(request_timeout)
            .poll_timeout(Duration::from_secs(opts.poll_timeout_secs))
            .build()?;

        Ok(Self::new(gateway, telegram, opts.max_stops, opts.map_path))
    }
}

impl<G> App<G>
where
    G: TransitGateway,
{
    pub fn new(gateway: G, telegram: TelegramClient, max_stops: usize, map_path: PathBuf) -> Self {
        Self {
            gateway,
            telegram,
            max_stops,
            map_path,
            username: None,
        }
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn telegram(&self) -> &TelegramClient {
        &self.telegram
    }

    /// Publishes the command list so clients can suggest it.
    pub async fn register_commands(&self) -> AppResult<()> {
        let commands: Vec<_> = Command::ALL
            .iter()
            .map(|command| BotCommand {
                command: command.name().to_owned(),
                description: command.description().to_owned(),
            })
            .collect();

        self.telegram.set_my_commands(&commands).await?;
        Ok(())
    }

    /// Handles a single update. Errors are logged and end here.
    pub async fn handle_update(&self, update: Update) {
        let timer = std::time::Instant::now();
        let update_id = update.update_id;

        let message = match update.message {
            Some(message) => message,
            None => {
                trace!("ignoring update {} without a message", update_id);
                return;
            }
        };

        match self.try_handle_message(&message).await {
            Ok(true) => info!(
                "handled update {} for chat {} in {:?}",
                update_id,
                message.chat.id,
                timer.elapsed()
            ),
            Ok(false) => debug!("nothing to do for update {}", update_id),
            Err(e) => error!(
                "failed to handle update {} for chat {}: {}",
                update_id, message.chat.id, e
            ),
        }
    }

    async fn try_handle_message(&self, message: &Message) -> AppResult<bool> {
        let reply = match self.reply_to(message).await {
            Some(reply) => reply,
            None => return Ok(false),
        };

        let chat_id = message.chat.id;
        let is_markdown = matches!(
            reply,
            Reply::Text {
                parse_mode: Some(_),
                ..
            }
        );

        match self.send(chat_id, reply).await {
            Ok(()) => Ok(true),
            Err(e) if is_markdown => {
                warn!("formatted reply to chat {} was rejected: {}", chat_id, e);
                self.send(chat_id, Reply::plain(SEND_FAILED_TEXT)).await?;
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Works out the answer to a message, if it deserves one.
    pub async fn reply_to(&self, message: &Message) -> Option<Reply> {
        if let Some(location) = message.location {
            info!("chat {} shared a location", message.chat.id);
            return Some(
                self.departures_reply(location.latitude, location.longitude)
                    .await,
            );
        }

        let command = Command::parse(message.text.as_deref()?, self.username.as_deref())?;
        info!("chat {} sent /{}", message.chat.id, command.name());

        let reply = match command {
            Command::Start => Reply::Text {
                text: SHARE_LOCATION_TEXT.to_owned(),
                parse_mode: None,
                keyboard: Some(location_keyboard()),
            },
            Command::Help => Reply::markdown(help_text()),
            Command::Map => match tokio::fs::metadata(&self.map_path).await {
                Ok(metadata) if metadata.is_file() => Reply::Photo {
                    path: self.map_path.clone(),
                    caption: MAP_CAPTION.to_owned(),
                },
                _ => {
                    warn!("map image '{}' not found", self.map_path.display());
                    Reply::plain(MAP_MISSING_TEXT)
                }
            },
        };

        Some(reply)
    }

    async fn departures_reply(&self, lat: f64, lon: f64) -> Reply {
        match Board::fetch(&self.gateway, lat, lon, self.max_stops).await {
            Ok(board) => board.render(chrono::Utc::now()),
            Err(e) => {
                error!("failed to look up stops near ({}, {}): {}", lat, lon, e);
                Reply::plain(UPSTREAM_ERROR_TEXT)
            }
        }
    }

    async fn send(&self, chat_id: i64, reply: Reply) -> Result<(), TelegramError> {
        match reply {
            Reply::Text {
                text,
                parse_mode,
                keyboard,
            } => {
                self.telegram
                    .send_message(chat_id, &text, parse_mode, keyboard.as_ref())
                    .await?;
            }
            Reply::Photo { path, caption } => {
                self.telegram.send_photo(chat_id, &path, &caption).await?;
            }
        }
        Ok(())
    }
}

fn location_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup {
        keyboard: vec![vec![KeyboardButton {
            text: SEND_LOCATION_BUTTON.to_owned(),
            request_location: true,
        }]],
        resize_keyboard: true,
        one_time_keyboard: true,
    }
}

fn help_text() -> String {
    let mut lines = vec![format!("🤖 {}\n", markdown::bold("Available Commands:"))];
    for command in &Command::ALL {
        lines.push(format!(
            "/{} – {}",
            markdown::escape(command.name()),
            markdown::escape(command.description())
        ));
    }
    lines.join("\n")
}

/// What the bot sends back for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        parse_mode: Option<ParseMode>,
        keyboard: Option<ReplyKeyboardMarkup>,
    },
    Photo {
        path: PathBuf,
        caption: String,
    },
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    /// `text` must already be escaped.
    pub fn markdown(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            parse_mode: Some(ParseMode::MarkdownV2),
            keyboard: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Map,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Start, Command::Help, Command::Map];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Map => "map",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Start => "Start the bot and request your location 📍",
            Command::Help => "Show this help message",
            Command::Map => "Show the Stockholm train map 🚇",
        }
    }

    /// Reads `/name` or `/name@BotName` from the start of a message.
    ///
    /// A command addressed to another bot is not ours. While the bot's own
    /// username is unknown, any `@` suffix is accepted.
    pub fn parse(text: &str, username: Option<&str>) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let mut parts = first.strip_prefix('/')?.splitn(2, '@');
        let name = parts.next()?;

        if let (Some(addressee), Some(username)) = (parts.next(), username) {
            if !addressee.eq_ignore_ascii_case(username) {
                return None;
            }
        }

        name.parse().ok()
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "help" => Ok(Command::Help),
            "map" => Ok(Command::Map),
            unknown => Err(format!("unknown command '{}'", unknown)),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Configuration(String),
    Telegram(TelegramError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Configuration(message) => write!(f, "configuration error: {}", message),
            AppError::Telegram(e) => write!(f, "{}", e),
        }
    }
}

impl Error for AppError {}

impl From<TransitBuilderError> for AppError {
    fn from(e: TransitBuilderError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<TelegramBuilderError> for AppError {
    fn from(e: TelegramBuilderError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<TelegramError> for AppError {
    fn from(e: TelegramError) -> Self {
        Self::Telegram(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        board::{
            tests::{stop, FakeGateway},
            NO_STOPS_TEXT,
        },
        departures::tests::departure,
        telegram::{Chat, Location},
    };
    use chrono::Duration;

    fn app(gateway: FakeGateway, map_path: &str) -> App<FakeGateway> {
        let telegram = TelegramClient::new("123:test".to_string()).build().unwrap();
        App::new(gateway, telegram, 5, PathBuf::from(map_path))
    }

    fn text_message(text: &str) -> Message {
        Message {
            chat: Chat { id: 42 },
            text: Some(text.to_string()),
            location: None,
        }
    }

    fn location_message() -> Message {
        Message {
            chat: Chat { id: 42 },
            text: None,
            location: Some(Location {
                latitude: 59.342931,
                longitude: 18.049475,
            }),
        }
    }

    #[test]
    fn parse_commands() {
        let me = Some("departures_bot");
        assert_eq!(Command::parse("/start", me), Some(Command::Start));
        assert_eq!(Command::parse("/help@departures_bot", me), Some(Command::Help));
        assert_eq!(Command::parse("/help@Departures_Bot", me), Some(Command::Help));
        assert_eq!(Command::parse("  /MAP please", me), Some(Command::Map));

        let invalids = ["start", "/stop", "", "hello /help", "/", "/start@other_bot"];
        for invalid in &invalids {
            assert_eq!(Command::parse(invalid, me), None, "{:?}", invalid);
        }
    }

    #[test]
    fn any_addressee_before_username_is_known() {
        assert_eq!(Command::parse("/start@other_bot", None), Some(Command::Start));
    }

    #[tokio::test]
    async fn commands_for_other_bots_are_ignored() {
        let mut app = app(FakeGateway::default(), "train_map.png");
        app.set_username(Some("departures_bot".to_string()));

        let reply = app.reply_to(&text_message("/start@other_bot")).await;
        assert_eq!(reply, None);

        let reply = app.reply_to(&text_message("/start@departures_bot")).await;
        assert!(reply.is_some());
    }

    #[tokio::test]
    async fn rejected_markdown_falls_back_to_plain_notice() {
        let (url, server) = crate::stub::serve(vec![
            (
                400,
                r#"{ "ok": false, "error_code": 400, "description": "Bad Request: message is too long" }"#
                    .to_string(),
            ),
            (
                200,
                r#"{ "ok": true, "result": { "message_id": 2, "chat": { "id": 42 } } }"#.to_string(),
            ),
        ])
        .await;

        let telegram = TelegramClient::new("123:test".to_string())
            .api_url(url)
            .build()
            .unwrap();
        let app = App::new(FakeGateway::default(), telegram, 5, PathBuf::from("train_map.png"));

        app.handle_update(Update {
            update_id: 1,
            message: Some(text_message("/help")),
        })
        .await;

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("MarkdownV2"), "{}", requests[0]);
        assert!(requests[1].contains(SEND_FAILED_TEXT), "{}", requests[1]);
        assert!(!requests[1].contains("parse_mode"), "{}", requests[1]);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        assert!(help.starts_with("🤖 *Available Commands:*\n\n"), "{}", help);
        for command in &Command::ALL {
            assert!(help.contains(&format!("/{} – ", command.name())), "{}", help);
        }
    }

    #[tokio::test]
    async fn start_asks_for_location() {
        let reply = app(FakeGateway::default(), "train_map.png")
            .reply_to(&text_message("/start"))
            .await;

        match reply {
            Some(Reply::Text {
                text,
                parse_mode,
                keyboard: Some(keyboard),
            }) => {
                assert_eq!(text, SHARE_LOCATION_TEXT);
                assert_eq!(parse_mode, None);
                assert!(keyboard.one_time_keyboard);
                assert!(keyboard.keyboard[0][0].request_location);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_map_is_reported() {
        let reply = app(FakeGateway::default(), "does/not/exist.png")
            .reply_to(&text_message("/map"))
            .await;
        assert_eq!(reply, Some(Reply::plain(MAP_MISSING_TEXT)));
    }

    #[tokio::test]
    async fn map_is_sent_as_photo() {
        let path = std::env::temp_dir().join("departures-bot-test-map.png");
        std::fs::write(&path, b"PNG").unwrap();

        let reply = app(FakeGateway::default(), path.to_str().unwrap())
            .reply_to(&text_message("/map"))
            .await;
        assert_eq!(
            reply,
            Some(Reply::Photo {
                path: path.clone(),
                caption: MAP_CAPTION.to_owned(),
            })
        );

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let reply = app(FakeGateway::default(), "train_map.png")
            .reply_to(&text_message("where is my bus?"))
            .await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn location_without_stops() {
        let gateway = FakeGateway {
            stops: Some(Vec::new()),
            ..Default::default()
        };
        let reply = app(gateway, "train_map.png")
            .reply_to(&location_message())
            .await;
        assert_eq!(reply, Some(Reply::plain(NO_STOPS_TEXT)));
    }

    #[tokio::test]
    async fn location_with_failing_lookup() {
        let reply = app(FakeGateway::default(), "train_map.png")
            .reply_to(&location_message())
            .await;
        assert_eq!(reply, Some(Reply::plain(UPSTREAM_ERROR_TEXT)));
    }

    #[tokio::test]
    async fn location_with_departures_is_markdown() {
        let mut gateway = FakeGateway {
            stops: Some(vec![stop("740021669", "Odenplan")]),
            ..Default::default()
        };
        // far enough ahead that the wall clock cannot turn it into "Arr"
        gateway.departures.insert(
            "740021669".to_string(),
            vec![departure(
                "55",
                "North",
                None,
                Some(Duration::days(3650)),
            )],
        );

        let reply = app(gateway, "train_map.png")
            .reply_to(&location_message())
            .await;

        match reply {
            Some(Reply::Text {
                text,
                parse_mode: Some(ParseMode::MarkdownV2),
                keyboard: None,
            }) => {
                assert!(text.contains("📍 *Odenplan*\n🚍55  : "), "{}", text);
                assert!(text.ends_with("m\n"), "{}", text);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
