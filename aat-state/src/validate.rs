//! Checking a state table for logical problems.

use crate::{
    diagnostics::{codes, Counting, DiagnosticSink},
    names::{ClassId, StateId},
    state_table::StateTable,
};

impl StateTable {
    /// Report problems that decoding does not catch, such as entries that
    /// loop forever.
    ///
    /// Returns `true` if no errors were reported. Warnings do not affect the
    /// result.
    pub fn validate(&self, sink: &mut dyn DiagnosticSink) -> bool {
        let mut sink = Counting::new(sink);
        let kind = self.kind();

        for state in [StateId::START_OF_TEXT, StateId::START_OF_LINE] {
            if !self.is_defined(state) {
                sink.error(
                    codes::MISSING_FIXED_STATE,
                    format!("The fixed state '{}' is missing.", self.state_name(state)),
                );
            }
        }

        let mut used = vec![false; self.names().num_classes()];
        for (_, class) in self.class_table().iter() {
            used[class.index()] = true;
        }
        for (_, row) in self.rows() {
            for (class, _) in row.iter() {
                used[class.index()] = true;
            }
        }
        let classes = self
            .names()
            .classes()
            .filter(|class| class.is_fixed() || used[class.index()])
            .collect::<Vec<_>>();

        for (state, row) in self.rows() {
            let state_name = self.state_name(state);
            let missing = classes
                .iter()
                .filter(|class| !row.contains(**class))
                .collect::<Vec<_>>();
            let (fixed, other): (Vec<&ClassId>, Vec<&ClassId>) =
                missing.into_iter().partition(|class| class.is_fixed());
            if !fixed.is_empty() {
                let names = fixed.iter().map(|c| self.class_name(**c)).collect::<Vec<_>>();
                sink.error(
                    codes::MISSING_FIXED_CLASS,
                    format!("State '{state_name}' has no entries for the fixed classes {names:?}."),
                );
            }
            if !other.is_empty() {
                let names = other.iter().map(|c| self.class_name(**c)).collect::<Vec<_>>();
                sink.error(
                    codes::INCOMPLETE_ROW,
                    format!("State '{state_name}' has no entries for the classes {names:?}."),
                );
            }

            for (class, entry) in row.iter() {
                let class_name = self.class_name(class);
                if entry.payload.kind() != kind {
                    sink.error(
                        codes::CANNOT_CONTINUE,
                        format!(
                            "The entry for state '{state_name}', class '{class_name}' has a {} \
                             action in a {kind} table.",
                            entry.payload.kind()
                        ),
                    );
                }
                if !self.is_defined(entry.new_state) {
                    sink.error(
                        codes::UNDEFINED_STATE,
                        format!(
                            "The entry for state '{state_name}', class '{class_name}' goes to \
                             the undefined state '{}'.",
                            self.state_name(entry.new_state)
                        ),
                    );
                }
                if entry.new_state == state && !entry.advances() {
                    sink.error(
                        codes::INFINITE_LOOP,
                        format!(
                            "The entry for state '{state_name}', class '{class_name}' stays in \
                             the same state without advancing, which loops forever."
                        ),
                    );
                }
            }
        }

        self.class_table().check(self.names(), &mut sink);
        let mut mapped = vec![false; self.names().num_classes()];
        for (_, class) in self.class_table().iter() {
            mapped[class.index()] = true;
        }
        let unused = classes
            .iter()
            .filter(|class| !class.is_fixed() && !mapped[class.index()])
            .map(|class| self.class_name(*class))
            .collect::<Vec<_>>();
        if !unused.is_empty() {
            sink.warning(
                codes::UNUSED_CLASS,
                format!("No glyphs are in the classes {unused:?}."),
            );
        }

        sink.errors() == 0
    }
}
