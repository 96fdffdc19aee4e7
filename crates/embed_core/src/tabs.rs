use thiserror::Error;
use tracing::debug;

pub type SelectCallback = Box<dyn Fn() + Send + Sync>;

pub struct Tab {
    name: String,
    on_select: SelectCallback,
}

impl Tab {
    pub fn new(name: impl Into<String>, on_select: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            on_select: Box::new(on_select),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("no tab named '{0}' is registered")]
    NotFound(String),
    #[error("a tab named '{0}' is already registered")]
    Duplicate(String),
}

/// Exclusive selection over an ordered set of named tabs.
///
/// The controller is the only record of which tab is selected. Selecting a tab
/// runs that tab's `on_select` and nothing else; the callback owns whatever view
/// updates selection implies. Re-selecting the current tab runs its callback again.
#[derive(Default)]
pub struct TabController {
    tabs: Vec<Tab>,
    selected: Option<usize>,
}

impl TabController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `tab`. Registration never selects anything.
    pub fn register_tab(&mut self, tab: Tab) -> Result<(), TabError> {
        if self.position(tab.name()).is_some() {
            return Err(TabError::Duplicate(tab.name));
        }
        self.tabs.push(tab);
        Ok(())
    }

    pub fn select_tab(&mut self, name: &str) -> Result<(), TabError> {
        let index = self
            .position(name)
            .ok_or_else(|| TabError::NotFound(name.to_string()))?;
        let reselect = self.selected == Some(index);
        self.selected = Some(index);
        debug!(tab = name, reselect, "tabs: selected");
        (self.tabs[index].on_select)();
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.map(|index| self.tabs[index].name())
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected() == Some(name)
    }

    pub fn tab_names(&self) -> impl Iterator<Item = &str> {
        self.tabs.iter().map(Tab::name)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.name() == name)
    }
}

#[cfg(test)]
#[path = "tests/tabs_tests.rs"]
mod tests;
