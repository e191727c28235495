//! The interactive browse loop, minus its terminal and transport.
//!
//! The CLI feeds parsed commands and finished work into a [`BrowseSession`]
//! and carries out the [`Action`]s it hands back:
//!
//! ```text
//! "i a.jpg"  → open details, Preload(a.jpg)
//! "n"        → Load(page 2) held behind the details view
//! "c"        → close details, Run(Load(page 2))
//! ```
//!
//! While the details view is open, page loads and thumbnail requests wait in
//! a [`ModalGate`] and run in submission order once it closes. Metadata
//! lookups run concurrently with everything else but never more than the
//! [`MetadataPreloader`] allows at once.

use super::persist::PersistedView;
use super::queue::{MetadataPreloader, ModalGate};
use super::state::{Effect, FetchRequest, GalleryState, Viewport};
use crate::media::{FilterKind, MediaType};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Next,
    Filter(FilterKind),
    Retry,
    Delete(String),
    Info(String),
    Close,
    Quit,
    Help,
}

impl BrowseCommand {
    /// Parse one input line. Blank lines parse to `None`; anything
    /// unrecognised asks for help.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();
        Some(match cmd {
            "" => return None,
            "q" | "quit" => Self::Quit,
            "n" | "next" => Self::Next,
            "f" | "filter" => Self::Filter(FilterKind::parse(arg)),
            "r" | "retry" => Self::Retry,
            "c" | "close" => Self::Close,
            "d" | "delete" if !arg.is_empty() => Self::Delete(arg.to_string()),
            "i" | "info" if !arg.is_empty() => Self::Info(arg.to_string()),
            _ => Self::Help,
        })
    }
}

/// Work held back while the details view is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Load(FetchRequest),
    Thumbnail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run(Task),
    /// Start a metadata lookup; report back with
    /// [`BrowseSession::preload_finished`].
    Preload(String),
    /// Delete on the server; report back with [`BrowseSession::deleted`].
    Delete(String),
    Say(String),
    Help,
    Quit,
}

#[derive(Debug)]
pub struct BrowseSession {
    state: GalleryState,
    gate: ModalGate<Task>,
    preloader: MetadataPreloader,
    thumbnails: bool,
}

impl BrowseSession {
    pub fn new(state: GalleryState, thumbnails: bool) -> Self {
        Self {
            state,
            gate: ModalGate::new(),
            preloader: MetadataPreloader::default(),
            thumbnails,
        }
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GalleryState {
        &mut self.state
    }

    pub fn details_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn held(&self) -> usize {
        self.gate.pending()
    }

    pub fn preloader(&self) -> &MetadataPreloader {
        &self.preloader
    }

    /// Load the persisted or requested view.
    pub fn start(&mut self, view: &PersistedView) -> Vec<Action> {
        let request = self
            .state
            .request_page(view.filter, view.page, false, Viewport::default());
        self.load(request, "A page is already loading.")
    }

    pub fn command(&mut self, command: BrowseCommand) -> Vec<Action> {
        match command {
            BrowseCommand::Next => {
                let request = self.state.next_page(Viewport::default());
                let busy = if self.state.is_loading() {
                    "A page is already loading."
                } else {
                    "No more files."
                };
                self.load(request, busy)
            }
            BrowseCommand::Filter(kind) => {
                let request = self.state.set_filter(kind);
                self.load(request, "A page is already loading.")
            }
            BrowseCommand::Retry => {
                let request = self.state.retry();
                self.load(request, "Nothing to retry.")
            }
            BrowseCommand::Delete(name) => vec![Action::Delete(name)],
            BrowseCommand::Info(name) => {
                self.gate.open();
                match self.preloader.request(name.as_str()) {
                    Some(name) => vec![Action::Preload(name)],
                    None => vec![Action::Say(format!("{name}: waiting for a lookup slot"))],
                }
            }
            BrowseCommand::Close => {
                if !self.gate.is_open() {
                    return vec![Action::Say("Nothing to close.".to_string())];
                }
                self.gate.close().into_iter().map(Action::Run).collect()
            }
            BrowseCommand::Quit => vec![Action::Quit],
            BrowseCommand::Help => vec![Action::Help],
        }
    }

    /// A page load finished with `effects`; queue thumbnails for what it showed.
    pub fn loaded(&mut self, effects: &[Effect]) -> Vec<Action> {
        if !self.thumbnails {
            return Vec::new();
        }
        let names: Vec<String> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::AppendItems(items) => Some(items),
                _ => None,
            })
            .flatten()
            .filter(|item| matches!(item.media_type, MediaType::Image | MediaType::Video))
            .map(|item| item.filename.clone())
            .collect();
        names
            .into_iter()
            .filter_map(|name| self.submit(Task::Thumbnail(name)))
            .collect()
    }

    /// A delete succeeded on the server.
    pub fn deleted(&mut self, filename: &str) -> Vec<Action> {
        let request = self.state.on_deleted(filename, Viewport::default());
        self.load(request, "A page is already loading; reload with 'f' later.")
    }

    /// A metadata lookup finished; start the next one waiting, if any.
    pub fn preload_finished(&mut self) -> Vec<Action> {
        self.preloader.finish().map(Action::Preload).into_iter().collect()
    }

    /// Drop whatever is still held. Returns how many tasks were dropped.
    pub fn shutdown(&mut self) -> usize {
        let dropped = self.gate.cancel_all();
        if dropped > 0 {
            warn!(dropped, "held work cancelled on exit");
        }
        dropped
    }

    fn load(&mut self, request: Option<FetchRequest>, refused: &str) -> Vec<Action> {
        let Some(request) = request else {
            return vec![Action::Say(refused.to_string())];
        };
        match self.submit(Task::Load(request)) {
            Some(action) => vec![action],
            None => vec![Action::Say(
                "Page load held until details close ('c').".to_string(),
            )],
        }
    }

    fn submit(&mut self, task: Task) -> Option<Action> {
        self.gate.submit(task).map(Action::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(names: &[&str], page: usize, has_more: bool) -> serde_json::Value {
        json!({
            "files": names,
            "counts": {"images": names.len(), "videos": 0, "others": 0},
            "hasMore": has_more,
            "page": page,
            "totalFiles": 10,
            "totalPages": 5
        })
    }

    fn started(thumbnails: bool) -> BrowseSession {
        let mut session = BrowseSession::new(GalleryState::new(2), thumbnails);
        let actions = session.start(&PersistedView::default());
        let Some(Action::Run(Task::Load(req))) = actions.first() else {
            panic!("expected an initial load, got {actions:?}");
        };
        assert_eq!(req.page, 1);
        session.state_mut().complete(&page(&["a.jpg", "b.txt"], 1, true));
        session
    }

    fn load_request(actions: &[Action]) -> Option<&FetchRequest> {
        actions.iter().find_map(|a| match a {
            Action::Run(Task::Load(req)) => Some(req),
            _ => None,
        })
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BrowseCommand::parse("  "), None);
        assert_eq!(BrowseCommand::parse("n"), Some(BrowseCommand::Next));
        assert_eq!(
            BrowseCommand::parse("f video"),
            Some(BrowseCommand::Filter(FilterKind::Video))
        );
        assert_eq!(
            BrowseCommand::parse("i  a.jpg "),
            Some(BrowseCommand::Info("a.jpg".into()))
        );
        assert_eq!(BrowseCommand::parse("d"), Some(BrowseCommand::Help));
        assert_eq!(BrowseCommand::parse("close"), Some(BrowseCommand::Close));
    }

    #[test]
    fn loads_run_immediately_without_details() {
        let mut session = started(false);
        let actions = session.command(BrowseCommand::Next);
        assert_eq!(load_request(&actions).map(|r| r.page), Some(2));
    }

    #[test]
    fn details_hold_loads_until_closed() {
        let mut session = started(false);
        let actions = session.command(BrowseCommand::Info("a.jpg".into()));
        assert_eq!(actions, vec![Action::Preload("a.jpg".into())]);
        assert!(session.details_open());

        let actions = session.command(BrowseCommand::Next);
        assert!(load_request(&actions).is_none());
        assert_eq!(session.held(), 1);
        // Only one load at a time, even while it is held.
        assert!(matches!(
            session.command(BrowseCommand::Filter(FilterKind::Video)).as_slice(),
            [Action::Say(_)]
        ));

        let released = session.command(BrowseCommand::Close);
        assert_eq!(load_request(&released).map(|r| r.page), Some(2));
        assert!(!session.details_open());
        assert_eq!(session.held(), 0);
    }

    #[test]
    fn thumbnails_held_in_order_behind_details() {
        let mut session = started(true);
        session.command(BrowseCommand::Info("a.jpg".into()));

        let held = session.loaded(&[Effect::AppendItems(vec![
            crate::gallery::GalleryItem::named("c.jpg"),
            crate::gallery::GalleryItem::named("d.pdf"),
            crate::gallery::GalleryItem::named("e.mp4"),
        ])]);
        assert!(held.is_empty());
        assert_eq!(
            session.command(BrowseCommand::Close),
            vec![
                Action::Run(Task::Thumbnail("c.jpg".into())),
                Action::Run(Task::Thumbnail("e.mp4".into())),
            ]
        );
    }

    #[test]
    fn metadata_lookups_are_capped() {
        let mut session = started(false);
        session.command(BrowseCommand::Info("a.jpg".into()));
        let second = session.command(BrowseCommand::Info("b.txt".into()));
        assert!(matches!(second.as_slice(), [Action::Say(_)]));
        assert_eq!(session.preloader().active(), 1);
        assert_eq!(session.preloader().waiting(), 1);

        assert_eq!(
            session.preload_finished(),
            vec![Action::Preload("b.txt".into())]
        );
        assert!(session.preload_finished().is_empty());
        assert_eq!(session.preloader().active(), 0);
    }

    #[test]
    fn delete_reload_is_held_behind_details() {
        let mut session = started(false);
        assert_eq!(
            session.command(BrowseCommand::Delete("a.jpg".into())),
            vec![Action::Delete("a.jpg".into())]
        );
        session.command(BrowseCommand::Info("b.txt".into()));
        assert!(load_request(&session.deleted("a.jpg")).is_none());
        assert_eq!(session.shutdown(), 1);
    }

    #[test]
    fn close_without_details() {
        let mut session = started(false);
        assert!(matches!(
            session.command(BrowseCommand::Close).as_slice(),
            [Action::Say(_)]
        ));
    }

    #[test]
    fn next_without_more_says_so() {
        let mut session = BrowseSession::new(GalleryState::new(2), false);
        session.start(&PersistedView::default());
        session.state_mut().complete(&page(&["a.jpg"], 1, false));
        assert_eq!(
            session.command(BrowseCommand::Next),
            vec![Action::Say("No more files.".into())]
        );
    }
}
