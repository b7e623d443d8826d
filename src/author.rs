//! Classification of authors by their association with a repository.
//!
//! Internal and external are mutually exclusive. First-time contributors are
//! also external, which is why these are separate predicates and not one enum.

use crate::types::AuthorAssociation;

impl AuthorAssociation {
    /// Owners, organisation members and collaborators.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthorAssociation::Owner | AuthorAssociation::Member | AuthorAssociation::Collaborator
        )
    }

    pub fn is_external(&self) -> bool {
        matches!(
            self,
            AuthorAssociation::Contributor
                | AuthorAssociation::None
                | AuthorAssociation::FirstTimeContributor
        )
    }

    pub fn is_first_time(&self) -> bool {
        matches!(self, AuthorAssociation::FirstTimeContributor)
    }
}
