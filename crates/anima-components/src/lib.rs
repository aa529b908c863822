//! Bundled components for the anima runtime.
//!
//! One interface (console) and three action providers (reminders, shell,
//! notes), each registering its action schemas with the pipeline and
//! performing the side effect in its handler.

pub mod console;
pub mod note;
pub mod reminder;
pub mod shell;

pub use console::{ConsoleInterface, Delivery};
pub use note::{Note, NoteProvider};
pub use reminder::ReminderProvider;
pub use shell::{ShellProvider, StagedCommand};
