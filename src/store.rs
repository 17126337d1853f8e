//! Canonical in-memory list of users.
//!
//! The list is a cache of the last observed server state. It only changes by
//! loading from the service or by applying the result of a call that already
//! succeeded remotely.

use crate::service::UserService;
use crate::user::{User, UserId};
use tracing::{debug, error};

#[derive(Debug, Clone, Default)]
pub struct UserList {
    users: Vec<User>,
}

impl UserList {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// Fetch the list from the service. A failure is logged and yields an
    /// empty list.
    pub fn load(service: &dyn UserService) -> Self {
        match service.list() {
            Ok(users) => {
                debug!(count = users.len(), "users loaded");
                Self::new(users)
            }
            Err(e) => {
                error!(error = %e, "Error fetching users");
                Self::default()
            }
        }
    }

    /// Replace the contents with a fresh fetch; same failure rule as [`load`](Self::load)
    pub fn reload(&mut self, service: &dyn UserService) {
        *self = Self::load(service);
    }

    pub fn on_create_succeeded(&mut self, user: User) {
        self.users.push(user);
    }

    /// Replace the entry with the same id. Unknown ids are ignored.
    pub fn on_update_succeeded(&mut self, user: User) {
        match self
            .users
            .iter_mut()
            .find(|u| u.id.is_some() && u.id == user.id)
        {
            Some(slot) => *slot = user,
            None => debug!(id = ?user.id, "updated user not in list"),
        }
    }

    /// Remove the entry with this id, keeping the others in order
    pub fn on_delete_confirmed(&mut self, id: UserId) {
        self.users.retain(|u| u.id != Some(id));
    }

    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{AddressField, TextField, UserForm};
    use crate::service::testing::{Call, MockService};

    fn user(id: UserId, name: &str) -> User {
        User {
            id: Some(id),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn ids(list: &UserList) -> Vec<UserId> {
        list.iter().filter_map(|u| u.id).collect()
    }

    #[test]
    fn test_load_keeps_service_order() {
        let service = MockService::with_users(vec![user(3, "c"), user(1, "a"), user(2, "b")]);
        let list = UserList::load(&service);
        assert_eq!(ids(&list), vec![3, 1, 2]);
        assert_eq!(service.calls(), vec![Call::List]);
    }

    #[test]
    fn test_load_failure_yields_empty_list() {
        let service = MockService::failing();
        let list = UserList::load(&service);
        assert!(list.is_empty());
    }

    #[test]
    fn test_reload_replaces_contents() {
        let service = MockService::with_users(vec![user(1, "a")]);
        let mut list = UserList::new(vec![user(9, "stale")]);
        list.reload(&service);
        assert_eq!(ids(&list), vec![1]);
    }

    #[test]
    fn test_create_appends() {
        let mut list = UserList::new(vec![user(1, "a")]);
        list.on_create_succeeded(user(11, "new"));
        assert_eq!(ids(&list), vec![1, 11]);
    }

    #[test]
    fn test_update_replaces_matching_entry_in_place() {
        let mut list = UserList::new(vec![user(1, "a"), user(5, "Al"), user(7, "c")]);
        list.on_update_succeeded(user(5, "Albert"));
        assert_eq!(ids(&list), vec![1, 5, 7]);
        assert_eq!(list.get(5).unwrap().name, "Albert");
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut list = UserList::new(vec![user(1, "a")]);
        list.on_update_succeeded(user(42, "ghost"));
        list.on_update_succeeded(User::default());
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(1).unwrap().name, "a");
    }

    #[test]
    fn test_delete_removes_exactly_one_and_keeps_order() {
        let mut list = UserList::new(vec![user(1, "a"), user(2, "b"), user(3, "c"), user(4, "d")]);
        list.on_delete_confirmed(2);
        assert_eq!(ids(&list), vec![1, 3, 4]);
        list.on_delete_confirmed(99);
        assert_eq!(ids(&list), vec![1, 3, 4]);
    }

    #[test]
    fn test_create_flow_end_to_end() {
        let service = MockService::with_users(vec![user(1, "Leanne")]);
        let mut list = UserList::load(&service);

        let mut form = UserForm::open_with_seed(None, 7);
        form.update_field(TextField::Name, "Clementine");
        form.update_field(TextField::Email, "clem@example.com");
        form.update_field(TextField::Phone, "5555555555");
        form.update_address_field(AddressField::Street, "Douglas Extension");
        form.update_address_field(AddressField::City, "McKenziehaven");

        let submitted = form.submit(&service).unwrap();
        list.on_create_succeeded(submitted.record().clone());
        drop(form);

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(2).unwrap().name, "Clementine");
        let creates = service
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count();
        assert_eq!(creates, 1);
    }

    #[test]
    fn test_edit_flow_end_to_end() {
        let mut al = user(5, "Al");
        al.email = "al@example.com".to_string();
        al.phone = "1234567890".to_string();
        al.address.street = "Main St".to_string();
        al.address.city = "Springfield".to_string();
        let service = MockService::with_users(vec![user(1, "Leanne"), al.clone()]);
        let mut list = UserList::load(&service);

        let mut form = UserForm::open_with_seed(list.get(5), 1);
        form.update_field(TextField::Name, "Albert");
        let submitted = form.submit(&service).unwrap();
        list.on_update_succeeded(submitted.record().clone());

        assert!(service.calls().iter().any(|c| matches!(c, Call::Update(5, _))));
        assert_eq!(list.get(5).unwrap().name, "Albert");
        assert_eq!(list.get(5).unwrap().username, "USER-5");
        assert_eq!(ids(&list), vec![1, 5]);
    }
}
