//! Bundled extensions.
//!
//! Each extension is a plain function that registers callbacks on a
//! [`HookBus`]. [`register_bundled`] installs all of them for a build; a
//! site that does not want one clears the hook it uses, or builds its own
//! bus from the individual `register` functions.
//!
//! | Extension | Hook | Adds |
//! |-----------|------|------|
//! | [`yaml`] | `file_text` | metadata from a leading `---` block |
//! | [`shortcodes`] | `init_build`, `node_text` | `[% name %]` tag expansion |
//! | [`breadcrumbs`] | `init_tree` | `crumbs` metadata |
//! | [`automenu`] | `init_tree`, `render_page` | `automenu` template variable |

pub mod automenu;
pub mod breadcrumbs;
pub mod shortcodes;
pub mod yaml;

use crate::hooks::HookBus;

/// Register every bundled extension.
pub fn register_bundled(hooks: &mut HookBus) {
    yaml::register(hooks);
    shortcodes::register(hooks);
    breadcrumbs::register(hooks);
    automenu::register(hooks);
}
