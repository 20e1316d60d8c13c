use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Linkage of functions.
pub enum Linkage {
    /// The function is defined in the module and visible to other modules.
    Public,

    #[default]
    /// The function is defined in the module and can NOT be referenced from
    /// another module.
    Private,

    /// The function is defined in the module, and other modules may carry an
    /// identical definition; the linker keeps exactly one of them.
    LinkOnceOdr,

    /// The function is declared here but defined outside of the module.
    External,
}

impl Linkage {
    pub fn has_definition(self) -> bool {
        !matches!(self, Self::External)
    }

    pub fn is_local(self) -> bool {
        matches!(self, Self::Private)
    }

    pub fn is_link_once_odr(self) -> bool {
        matches!(self, Self::LinkOnceOdr)
    }

    /// Returns `true` if the definition may be dropped once the module holds
    /// no reference to it.
    pub fn is_discardable(self) -> bool {
        matches!(self, Self::Private | Self::LinkOnceOdr)
    }

    /// Returns `true` if an entity outside the module may refer to the
    /// function.
    pub fn is_externally_visible(self) -> bool {
        matches!(self, Self::Public | Self::LinkOnceOdr | Self::External)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::LinkOnceOdr => write!(f, "link_once_odr"),
            Self::External => write!(f, "external"),
        }
    }
}

impl FromStr for Linkage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "link_once_odr" => Ok(Self::LinkOnceOdr),
            "external" => Ok(Self::External),
            _ => Err(()),
        }
    }
}
