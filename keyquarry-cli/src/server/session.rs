//! Session and command dispatch: tokenizes one input line into a verb
//! plus positional/flag tokens, then calls through `rpc::Dispatcher`
//! against an in-process kernel. Grounded on the teacher's
//! `Session`/`dispatcher`/`dispatcher_executor` split
//! (`kv-cli/src/server/session.rs`), re-targeted from the `LogCask`
//! engine to the KeyQuarry kernel and from a SQL-ish grammar to the
//! command verbs in the external-interfaces section.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use keyquarry::error::Error;
use keyquarry::events::Filter;
use keyquarry::kernel::ops::{ClearOptions, InspectOptions, ListKeysOptions, LockOptions, SetOptions};
use keyquarry::kernel::Kernel;
use keyquarry::rpc::{Dispatcher, Request, Response};
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use tokio::time::{timeout, Instant};

use crate::ast::token_kind::TokenKind;
use crate::ast::tokenizer::{all_reserved_keywords, Token, Tokenizer};
use crate::rusty::CliHelper;
use crate::server::config::{ConfigLoad, DEFAULT_PROMPT};
use crate::show::Show;

/// The CLI's own identity when talking to the kernel through the RPC
/// dispatcher; privileged iff it matches `Configuration::privileged_client_id`.
const CLI_CLIENT_ID: &str = "keyquarry-cli";

pub struct Session {
    running: Arc<AtomicBool>,
    dispatcher: Dispatcher,
    settings: ConfigLoad,
    keywords: Arc<Vec<String>>,
}

impl Session {
    pub async fn try_new(settings: ConfigLoad, is_repl: bool, running: Arc<AtomicBool>) -> Result<Self> {
        if is_repl {
            println!("Welcome to {}.", DEFAULT_PROMPT);
            println!();
        }

        let kernel = Arc::new(Kernel::new(settings.kernel.clone()));
        kernel.register(CLI_CLIENT_ID);
        let dispatcher = Dispatcher::new(kernel);

        Ok(Self {
            running,
            dispatcher,
            settings,
            keywords: Arc::new(all_reserved_keywords()),
        })
    }

    fn prompt(&self) -> String {
        match self.settings.prompt.as_deref() {
            Some(prompt) => format!("{} > ", prompt.trim_end()),
            None => format!("{} > ", DEFAULT_PROMPT),
        }
    }

    pub async fn handle_repl(&mut self) {
        let config = Builder::new()
            .completion_prompt_limit(5)
            .completion_type(CompletionType::Circular)
            .build();
        let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).unwrap();

        rl.set_helper(Some(CliHelper::with_keywords(self.keywords.clone())));
        rl.load_history(&get_history_path()).ok();

        'repl: loop {
            if !self.running.load(Ordering::SeqCst) {
                break 'repl;
            }

            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match self.handle_query(true, &line).await {
                        Ok(false) => break 'repl,
                        Ok(true) => {}
                        Err(e) => eprintln!("error: {e}"),
                    }
                }
                Err(ReadlineError::Io(err)) => eprintln!("io err: {err}"),
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    self.running.store(false, Ordering::SeqCst);
                }
                Err(ReadlineError::Eof) => break 'repl,
                Err(_) => {}
            }
        }

        println!("Bye~");
        let _ = rl.save_history(&get_history_path());
    }

    pub async fn handle_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        let start = Instant::now();
        for line in r.lines() {
            let line = line.map_err(|e| anyhow!("read lines err: {}", e))?;
            if line.trim().is_empty() {
                continue;
            }
            self.handle_query(false, &line).await?;
        }

        if self.settings.show_stats.unwrap_or(false) {
            println!("{:.3}", start.elapsed().as_secs_f64());
        }
        Ok(())
    }

    /// Executes one line; returns `Ok(false)` on `exit`/`quit`.
    async fn handle_query(&mut self, is_repl: bool, query: &str) -> Result<bool> {
        let query = query.trim_end_matches(';').trim();
        if query.is_empty() {
            return Ok(true);
        }
        if is_repl && (query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit")) {
            return Ok(false);
        }

        if is_repl && query.starts_with('.') {
            let parts = query.trim_start_matches('.').split_whitespace().collect::<Vec<_>>();
            if parts.len() != 2 {
                return Err(anyhow!("control command must be of the form `.cmd_name cmd_value`"));
            }
            self.settings.inject_cmd(parts[0], parts[1])?;
            eprintln!("Refresh Config OK ~");
            return Ok(true);
        }

        let tokens: Vec<Token> = Tokenizer::new(query)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow!(e))?
            .into_iter()
            .filter(|t| t.kind != TokenKind::EOI && t.kind != TokenKind::Newline)
            .collect();
        if tokens.is_empty() {
            return Ok(true);
        }

        self.dispatch_tokens(is_repl, &tokens).await?;
        Ok(true)
    }

    async fn dispatch_tokens(&mut self, is_repl: bool, tokens: &[Token<'_>]) -> Result<()> {
        let start = Instant::now();
        let show = Show::new_with_start(self.settings.is_show_affected(), is_repl, start);
        let client_id = CLI_CLIENT_ID;

        macro_rules! arg {
            ($i:expr, $what:literal) => {
                tokens
                    .get($i)
                    .map(token_text)
                    .ok_or_else(|| anyhow!(concat!($what, " requires an argument")))?
            };
        }

        let affected = match tokens[0].kind {
            TokenKind::SET => {
                let key = arg!(1, "SET key");
                let value = arg!(2, "SET key value").into_bytes();
                let opts = parse_set_options(&tokens[3..])?;
                let outcome = self.request(client_id, Request::Set { key, value, opts }).await?;
                if let Response::Set(outcome) = outcome {
                    eprintln!("{}", if outcome.is_new { "OK (new)" } else { "OK" });
                }
                1
            }
            TokenKind::GET => {
                let key = arg!(1, "GET key");
                match self.request(client_id, Request::Get { key }).await {
                    Ok(Response::Get(v)) => eprintln!("{}", String::from_utf8_lossy(&v.value)),
                    Ok(_) => unreachable!(),
                    Err(Error::NotFound(_)) => eprintln!("N/A ~"),
                    Err(e) => eprintln!("{e}"),
                }
                1
            }
            TokenKind::DEL | TokenKind::DELETE => {
                let key = arg!(1, "DEL key");
                let deleted = self.request(client_id, Request::Delete { key }).await?;
                if let Response::Deleted(d) = deleted {
                    eprintln!("{}", if d { "OK ~" } else { "N/A ~" });
                }
                1
            }
            TokenKind::POP => {
                let key = arg!(1, "POP key");
                match self.request(client_id, Request::Pop { key }).await {
                    Ok(Response::Pop(v)) => eprintln!("{}", String::from_utf8_lossy(&v.value)),
                    Ok(_) => unreachable!(),
                    Err(Error::NotFound(_)) => eprintln!("N/A ~"),
                    Err(e) => eprintln!("{e}"),
                }
                1
            }
            TokenKind::EXISTS => {
                let key = arg!(1, "EXISTS key");
                if let Response::Exists(found) = self.request(client_id, Request::Exists { key }).await? {
                    eprintln!("{found}");
                }
                1
            }
            TokenKind::CLEAR => {
                let force = tokens[1..].iter().any(|t| t.kind == TokenKind::FORCE);
                let cleared = self.request(client_id, Request::Clear { opts: ClearOptions { force } }).await?;
                if let Response::Cleared(n) = cleared {
                    eprintln!("{n} keys cleared");
                }
                1
            }
            TokenKind::KEYS => {
                let opts = parse_list_options(&tokens[1..]);
                if let Response::Keys(keys) = self.request(client_id, Request::ListKeys { opts }).await? {
                    for key in &keys {
                        eprintln!("{key}");
                    }
                    keys.len() as i64
                } else {
                    0
                }
            }
            TokenKind::STATS | TokenKind::INFO | TokenKind::KSIZE => {
                if let Response::Stats(stats) = self.request(client_id, Request::Stats).await? {
                    match tokens[0].kind {
                        TokenKind::KSIZE => eprintln!("{}", stats.keys),
                        _ => eprintln!("{stats:#?}"),
                    }
                }
                1
            }
            TokenKind::LOCK => {
                let key = arg!(1, "LOCK key duration_secs");
                let secs: u64 = arg!(2, "LOCK key duration_secs")
                    .parse()
                    .map_err(|_| anyhow!("lock duration must be an integer number of seconds"))?;
                let create_if_missing = tokens[3..].iter().any(|t| t.kind == TokenKind::FORCE);
                self.request(
                    client_id,
                    Request::Lock { key, duration: Duration::from_secs(secs), opts: LockOptions { create_if_missing } },
                )
                .await?;
                eprintln!("OK ~");
                1
            }
            TokenKind::UNLOCK => {
                let key = arg!(1, "UNLOCK key");
                self.request(client_id, Request::Unlock { key }).await?;
                eprintln!("OK ~");
                1
            }
            TokenKind::INSPECT => {
                let key = arg!(1, "INSPECT key");
                let include_value = tokens[2..].iter().any(|t| t.kind == TokenKind::VALUE);
                let include_metrics = tokens[2..].iter().any(|t| t.kind == TokenKind::METRIC);
                let opts = InspectOptions { include_value, include_metrics };
                if let Response::Inspect(info) = self.request(client_id, Request::Inspect { key, opts }).await? {
                    eprintln!("{info:#?}");
                }
                1
            }
            TokenKind::CLEARHISTORY => {
                let key = arg!(1, "CLEARHISTORY key");
                self.request(client_id, Request::ClearHistory { key }).await?;
                eprintln!("OK ~");
                1
            }
            TokenKind::GETREVISION => {
                let key = arg!(1, "GETREVISION key version");
                let version: u64 = arg!(2, "GETREVISION key version")
                    .parse()
                    .map_err(|_| anyhow!("version must be a non-negative integer"))?;
                if let Response::Revision(rev) = self.request(client_id, Request::GetRevision { key, version }).await? {
                    eprintln!("{}", String::from_utf8_lossy(&rev.value));
                }
                1
            }
            TokenKind::GETKEYMETRIC => {
                let key = arg!(1, "GETKEYMETRIC key");
                if let Response::KeyMetric(metric) = self.request(client_id, Request::GetKeyMetric { key }).await? {
                    eprintln!("{metric:#?}");
                }
                1
            }
            TokenKind::REGISTER => {
                self.request(client_id, Request::Register).await?;
                eprintln!("OK ~");
                1
            }
            TokenKind::SETREADONLY => {
                let enable = arg!(1, "SETREADONLY true|false")
                    .parse()
                    .map_err(|_| anyhow!("expected true or false"))?;
                self.request(client_id, Request::SetReadOnly { enable }).await?;
                eprintln!("OK ~");
                1
            }
            TokenKind::SHOW => {
                eprintln!("reserved prefix: {}", self.dispatcher.kernel().config().reserved_prefix());
                1
            }
            TokenKind::WATCH => self.watch(&tokens[1..]).await?,
            other => {
                return Err(anyhow!("unsupported command: {:?}", other));
            }
        };

        show.output(affected);
        Ok(())
    }

    async fn request(&self, client_id: &str, request: Request) -> Result<Response, Error> {
        self.dispatcher.dispatch_as(client_id, request).await
    }

    /// `WATCH [key] [LIMIT n]`: subscribes to the event bus and prints
    /// events as they arrive, stopping after `n` events (default:
    /// unbounded, terminated by Ctrl+C) or when the bus closes. The key
    /// filter narrows delivery to a single key; omit it to watch everything.
    async fn watch(&self, tail: &[Token<'_>]) -> Result<i64> {
        let limit = tail
            .iter()
            .position(|t| t.kind == TokenKind::LIMIT)
            .and_then(|i| tail.get(i + 1))
            .map(token_text)
            .and_then(|s| s.parse::<usize>().ok());

        let mut filter = Filter::default();
        if let Some(first) = tail.first() {
            if first.kind != TokenKind::LIMIT {
                filter.keys.insert(token_text(first));
            }
        }

        let mut subscription = self.dispatcher.watch(filter);
        let mut seen: i64 = 0;
        while limit.map(|n| (seen as usize) < n).unwrap_or(true) {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match timeout(Duration::from_millis(200), subscription.receiver.recv()).await {
                Ok(Some(event)) => {
                    eprintln!("{event:?}");
                    seen += 1;
                }
                Ok(None) => break,
                Err(_) => continue,
            }
        }
        Ok(seen)
    }
}

fn token_text(token: &Token<'_>) -> String {
    let text = token.text();
    if token.kind == TokenKind::QuotedString && text.len() >= 2 {
        text[1..text.len() - 1].to_string()
    } else {
        text.to_string()
    }
}

fn parse_set_options(tail: &[Token<'_>]) -> Result<SetOptions> {
    let mut opts = SetOptions::default();
    let mut i = 0;
    while i < tail.len() {
        match tail[i].kind {
            TokenKind::TTL => {
                let secs: u64 = tail
                    .get(i + 1)
                    .map(token_text)
                    .ok_or_else(|| anyhow!("TTL requires a seconds argument"))?
                    .parse()
                    .map_err(|_| anyhow!("TTL must be an integer number of seconds"))?;
                opts.lifespan = Some(Duration::from_secs(secs));
                i += 2;
            }
            TokenKind::LOCKFOR => {
                let secs: u64 = tail
                    .get(i + 1)
                    .map(token_text)
                    .ok_or_else(|| anyhow!("LOCKFOR requires a seconds argument"))?
                    .parse()
                    .map_err(|_| anyhow!("LOCKFOR must be an integer number of seconds"))?;
                opts.lock_duration = Some(Duration::from_secs(secs));
                i += 2;
            }
            TokenKind::CONTENTTYPE => {
                opts.content_type = Some(
                    tail.get(i + 1)
                        .map(token_text)
                        .ok_or_else(|| anyhow!("CONTENTTYPE requires a value"))?,
                );
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(opts)
}

fn parse_list_options(tail: &[Token<'_>]) -> ListKeysOptions {
    let mut opts = ListKeysOptions::default();
    let mut i = 0;
    while i < tail.len() {
        match tail[i].kind {
            TokenKind::PATTERN => {
                opts.pattern = tail.get(i + 1).map(token_text);
                i += 2;
            }
            TokenKind::LIMIT => {
                opts.limit = tail.get(i + 1).and_then(|t| token_text(t).parse().ok());
                i += 2;
            }
            _ => i += 1,
        }
    }
    opts
}

fn get_history_path() -> String {
    format!("{}/.keyquarry_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let settings = ConfigLoad::default();
        let running = Arc::new(AtomicBool::new(true));
        let mut session = Session::try_new(settings, false, running).await.unwrap();
        assert!(session.handle_query(false, "SET greeting hello").await.unwrap());
        assert!(session.handle_query(false, "GET greeting").await.unwrap());
    }

    #[tokio::test]
    async fn exit_stops_the_repl_loop() {
        let settings = ConfigLoad::default();
        let running = Arc::new(AtomicBool::new(true));
        let mut session = Session::try_new(settings, true, running).await.unwrap();
        assert!(!session.handle_query(true, "exit").await.unwrap());
    }

    #[tokio::test]
    async fn watch_with_zero_limit_returns_immediately() {
        let settings = ConfigLoad::default();
        let running = Arc::new(AtomicBool::new(true));
        let mut session = Session::try_new(settings, false, running).await.unwrap();
        assert!(session.handle_query(false, "WATCH LIMIT 0").await.unwrap());
    }
}
