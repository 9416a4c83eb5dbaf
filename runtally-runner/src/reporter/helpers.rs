// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::Style;

#[derive(Debug, Default, Clone)]
pub(super) struct Styles {
    pub(super) pass: Style,
    pub(super) fail: Style,
    pub(super) title: Style,
}

impl Styles {
    pub(super) fn colorize(&mut self) {
        self.pass = Style::new().green();
        self.fail = Style::new().red();
        self.title = Style::new().bold();
    }
}
