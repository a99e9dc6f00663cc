use strum_macros::{Display, EnumCount, EnumIter, EnumString};

/// Methods the router keeps a trie for. The discriminant indexes the
/// router's trie array.
///
/// Parsing is exact: methods are case-sensitive tokens, so `get` is not GET.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, EnumCount, EnumIter, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}
