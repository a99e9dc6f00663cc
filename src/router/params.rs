/// Values bound by named parameters and wildcards during resolution.
///
/// Slots are kept across `clear` so a pooled context rebinds parameters
/// without reallocating their strings.
#[derive(Debug, Default, Clone)]
pub struct Params {
    slots: Vec<(String, String)>,
    len: usize,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.slots[..self.len]
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn push(&mut self, name: &str, value: &str) {
        if let Some((k, v)) = self.slots.get_mut(self.len) {
            k.clear();
            k.push_str(name);
            v.clear();
            v.push_str(value);
        } else {
            self.slots.push((name.to_owned(), value.to_owned()));
        }
        self.len += 1;
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }
}
