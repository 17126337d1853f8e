use crate::{
    config::{Config, CONFIG_DIR},
    error::SubmitError,
    form::{AddressField, Submitted, TextField, UserForm},
    service::UserService,
    store::UserList,
    transcript::Transcript,
    user::UserId,
    view, Args,
};
use anyhow::{anyhow, bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{error, warn};

const FIELD_KEYS: &str = "name, email, phone, street, city, company, website";

pub struct Context {
    pub args: Args,
    pub session_id: String,
    pub config: Config,
    pub service: Rc<dyn UserService>,
    pub transcript: RefCell<Transcript>,
    pub users: RefCell<UserList>,
    /// The open create/edit form, if any
    pub form: RefCell<Option<UserForm>>,
}

impl Context {
    /// Build the session and load the initial list from the service
    pub fn new(
        args: Args,
        config: Config,
        service: Rc<dyn UserService>,
        transcript: Transcript,
        session_id: String,
    ) -> Self {
        let ctx = Self {
            args,
            session_id,
            config,
            service,
            transcript: RefCell::new(transcript),
            users: RefCell::new(UserList::default()),
            form: RefCell::new(None),
        };
        reload_users(&ctx);
        ctx
    }

    fn one_shot(&self) -> bool {
        self.args.command.is_some()
    }
}

/// Write a transcript event; a failing transcript never fails the command
fn record(ctx: &Context, event: impl FnOnce(&mut Transcript) -> Result<()>) {
    if let Err(e) = event(&mut *ctx.transcript.borrow_mut()) {
        warn!(error = %e, "failed to write transcript");
    }
}

fn reload_users(ctx: &Context) {
    ctx.users.borrow_mut().reload(ctx.service.as_ref());
    let count = ctx.users.borrow().len();
    record(ctx, |t| t.list_loaded(count));
}

pub fn run_once(ctx: &Context, line: &str) -> Result<()> {
    handle_line(ctx, line.trim())?;
    Ok(())
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = std::path::Path::new(CONFIG_DIR).join("history");
    if rl.load_history(&history).is_err() {
        tracing::debug!(path = %history.display(), "no history loaded");
    }

    println!("userdesk - type /help for commands, /exit to quit");
    println!("{}", view::render_table(&ctx.users.borrow()));

    loop {
        let prompt = if ctx.form.borrow().is_some() {
            "form> "
        } else {
            ">>> "
        };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_line(&ctx, line) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history) {
        warn!(error = %e, "failed to save history");
    }
    Ok(())
}

/// Route one input line. Returns true when the session should end.
fn handle_line(ctx: &Context, line: &str) -> Result<bool> {
    if line.starts_with('/') {
        return handle_command(ctx, line);
    }
    if ctx.form.borrow().is_some() {
        handle_form_input(ctx, line)?;
        return Ok(false);
    }
    bail!("Commands start with '/'. Type /help for a list.")
}

fn handle_command(ctx: &Context, cmd: &str) -> Result<bool> {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let rest = parts.get(1).map(|s| s.trim()).unwrap_or("");
    match parts[0] {
        "/exit" | "/quit" => return Ok(true),
        "/help" => print_help(),
        "/list" => println!("{}", view::render_table(&ctx.users.borrow())),
        "/reload" => {
            reload_users(ctx);
            println!("{}", view::render_table(&ctx.users.borrow()));
        }
        "/show" => show_user(ctx, parse_id(rest)?)?,
        "/add" => open_form(ctx, None, rest)?,
        "/edit" => {
            let (id, assignments) = split_id(rest)?;
            open_form(ctx, Some(id), assignments)?;
        }
        "/delete" => delete_user(ctx, parse_id(rest)?)?,
        "/session" => {
            println!("Session: {}", ctx.session_id);
            match &ctx.transcript.borrow().path {
                Some(path) => println!("Transcript: {}", path.display()),
                None => println!("Transcript: disabled"),
            }
            println!("Collection: {}/{}", ctx.config.api.base_url(), ctx.config.api.collection());
        }
        other => bail!("Unknown command: {}. Type /help for a list.", other),
    }
    Ok(false)
}

fn print_help() {
    println!("Commands:");
    println!("  /list                         - show users");
    println!("  /reload                       - fetch users from the service again");
    println!("  /show <id>                    - show one user's details");
    println!("  /add [field=value ...]        - open the create form");
    println!("  /edit <id> [field=value ...]  - open the edit form");
    println!("  /delete <id>                  - delete a user");
    println!("  /session                      - show session info");
    println!("  /help, /exit");
    println!("While a form is open:");
    println!("  field=value ...               - set fields ({})", FIELD_KEYS);
    println!("  show | submit | cancel");
}

fn parse_id(s: &str) -> Result<UserId> {
    let s = s.trim();
    if s.is_empty() {
        bail!("A user id is required");
    }
    s.parse::<UserId>()
        .map_err(|_| anyhow!("Invalid user id: {}", s))
}

/// Split "<id> rest..." into the id and the remaining text
fn split_id(s: &str) -> Result<(UserId, &str)> {
    let (id, rest) = s.split_once(' ').unwrap_or((s, ""));
    Ok((parse_id(id)?, rest.trim()))
}

/// Parse shell-quoted `field=value` pairs
pub fn parse_assignments(input: &str) -> Result<Vec<(String, String)>> {
    let words = shell_words::split(input).map_err(|e| anyhow!("Invalid input: {}", e))?;
    words
        .into_iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) => Ok((key.trim().to_lowercase(), value.to_string())),
            None => Err(anyhow!("Expected field=value, got '{}'", word)),
        })
        .collect()
}

/// Route one assignment to the matching form update
pub fn apply_assignment(form: &mut UserForm, key: &str, value: &str) -> Result<()> {
    match key {
        "name" => form.update_field(TextField::Name, value),
        "email" => form.update_field(TextField::Email, value),
        "phone" => form.update_field(TextField::Phone, value),
        "company" => form.update_field(TextField::Company, value),
        "website" => form.update_field(TextField::Website, value),
        "street" => form.update_address_field(AddressField::Street, value),
        "city" => form.update_address_field(AddressField::City, value),
        "username" => bail!("username is read-only"),
        other => bail!("Unknown field '{}'. Fields: {}", other, FIELD_KEYS),
    }
    Ok(())
}

fn apply_all(form: &mut UserForm, input: &str) -> Result<()> {
    for (key, value) in parse_assignments(input)? {
        apply_assignment(form, &key, &value)?;
    }
    Ok(())
}

fn open_form(ctx: &Context, id: Option<UserId>, assignments: &str) -> Result<()> {
    if ctx.form.borrow().is_some() {
        bail!("A form is already open; submit or cancel it first");
    }

    let mut form = match id {
        Some(id) => {
            let users = ctx.users.borrow();
            let user = users
                .get(id)
                .ok_or_else(|| anyhow!("No user with id {} in the list", id))?;
            UserForm::open(Some(user))
        }
        None => UserForm::open(None),
    };
    apply_all(&mut form, assignments)?;
    *ctx.form.borrow_mut() = Some(form);

    if ctx.one_shot() {
        return submit_form(ctx);
    }
    print_form(ctx);
    Ok(())
}

fn print_form(ctx: &Context) {
    if let Some(form) = ctx.form.borrow().as_ref() {
        println!("{}", view::render_form(form));
    }
}

fn handle_form_input(ctx: &Context, line: &str) -> Result<()> {
    match line {
        "submit" => submit_form(ctx),
        "cancel" => {
            *ctx.form.borrow_mut() = None;
            println!("Form closed.");
            Ok(())
        }
        "show" => {
            print_form(ctx);
            Ok(())
        }
        "help" => {
            print_help();
            Ok(())
        }
        _ => {
            {
                let mut slot = ctx.form.borrow_mut();
                let form = slot.as_mut().ok_or_else(|| anyhow!("No form is open"))?;
                apply_all(form, line)?;
            }
            print_form(ctx);
            Ok(())
        }
    }
}

/// Submit the open form. Success closes it and updates the list; any failure
/// leaves it open.
fn submit_form(ctx: &Context) -> Result<()> {
    let mut slot = ctx.form.borrow_mut();
    let form = slot.as_mut().ok_or_else(|| anyhow!("No form is open"))?;

    match form.submit(ctx.service.as_ref()) {
        Ok(submitted) => {
            let verb = match &submitted {
                Submitted::Created(user) => {
                    let id = user.id;
                    record(ctx, |t| t.user_created(id));
                    ctx.users.borrow_mut().on_create_succeeded(user.clone());
                    "Created"
                }
                Submitted::Updated(user) => {
                    let id = user.id;
                    record(ctx, |t| t.user_updated(id));
                    ctx.users.borrow_mut().on_update_succeeded(user.clone());
                    "Updated"
                }
            };
            let user = submitted.record();
            println!("{} user {} ({})", verb, user.id_label(), user.name);
            *slot = None;
            Ok(())
        }
        Err(SubmitError::Validation(errors)) => {
            record(ctx, |t| t.validation_failed(&errors));
            if ctx.one_shot() {
                eprintln!("{}", view::render_errors(&errors));
            } else {
                println!("{}", view::render_form(form));
            }
            Err(anyhow!(SubmitError::Validation(errors).notice()))
        }
        Err(e) => {
            let operation = if form.is_edit() { "update" } else { "create" };
            let id = form.editing();
            let detail = e.to_string();
            record(ctx, |t| t.request_failed(operation, id, &detail));
            Err(anyhow!(e.notice()))
        }
    }
}

fn show_user(ctx: &Context, id: UserId) -> Result<()> {
    match ctx.service.get(id) {
        Ok(user) => {
            println!("{}", view::render_detail(&user));
            Ok(())
        }
        Err(e) => {
            error!(error = %e, id, "Error fetching user details");
            let detail = e.to_string();
            record(ctx, |t| t.request_failed("get", Some(id), &detail));
            bail!("Could not load user {}", id)
        }
    }
}

/// Ask before deleting. In one-shot mode only --yes can confirm, and a
/// missing --yes is an error.
fn confirm_delete(ctx: &Context, id: UserId) -> Result<bool> {
    if ctx.args.yes || !ctx.config.ui.confirm_delete() {
        return Ok(true);
    }
    if ctx.one_shot() {
        bail!("Not deleting user {} - use --yes with -c", id);
    }

    println!("Are you sure you want to delete user {}?", id);
    print!("Delete? [y/N]: ");
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_ok() {
        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    } else {
        Ok(false)
    }
}

fn delete_user(ctx: &Context, id: UserId) -> Result<()> {
    if !confirm_delete(ctx, id)? {
        println!("Delete cancelled.");
        return Ok(());
    }

    match ctx.service.delete(id) {
        Ok(()) => {
            ctx.users.borrow_mut().on_delete_confirmed(id);
            record(ctx, |t| t.user_deleted(id));
            println!("Deleted user {}", id);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, id, "Error deleting user");
            let detail = e.to_string();
            record(ctx, |t| t.request_failed("delete", Some(id), &detail));
            bail!("Error deleting user {}. Please try again.", id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{Call, MockService};
    use crate::user::User;
    use clap::Parser;

    fn al() -> User {
        User {
            id: Some(5),
            name: "Al".to_string(),
            email: "al@example.com".to_string(),
            phone: "1234567890".to_string(),
            ..Default::default()
        }
    }

    fn context(service: &Rc<MockService>, argv: &[&str]) -> Context {
        let mut full = vec!["userdesk", "--no-transcript"];
        full.extend_from_slice(argv);
        let args = Args::parse_from(full);
        let shared: Rc<dyn UserService> = service.clone();
        Context::new(
            args,
            Config::default(),
            shared,
            Transcript::disabled("test"),
            "test".to_string(),
        )
    }

    #[test]
    fn test_parse_assignments_handles_quotes() {
        let pairs = parse_assignments(r#"name="Leanne Graham" city='South Elvis' phone=1234567890"#)
            .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "Leanne Graham".to_string()),
                ("city".to_string(), "South Elvis".to_string()),
                ("phone".to_string(), "1234567890".to_string()),
            ]
        );
        assert!(parse_assignments("").unwrap().is_empty());
        assert!(parse_assignments("name").is_err());
        assert!(parse_assignments("name=\"open").is_err());
    }

    #[test]
    fn test_apply_assignment_routes_fields() {
        let mut form = UserForm::open_with_seed(None, 1);
        apply_assignment(&mut form, "street", "Kulas Light").unwrap();
        apply_assignment(&mut form, "company", "Acme").unwrap();
        assert_eq!(form.draft().address.street, "Kulas Light");
        assert_eq!(form.draft().company.name, "Acme");

        let err = apply_assignment(&mut form, "username", "me").unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert_eq!(form.draft().username, "USER-1");
        assert!(apply_assignment(&mut form, "zipcode", "1").is_err());
    }

    #[test]
    fn test_context_loads_list_on_start() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &[]);
        assert_eq!(ctx.users.borrow().len(), 1);
        assert_eq!(service.calls(), vec![Call::List]);
    }

    #[test]
    fn test_repl_create_flow() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &[]);

        handle_line(&ctx, "/add name=Clementine email=clem@example.com").unwrap();
        assert!(ctx.form.borrow().is_some());
        handle_line(&ctx, "phone=5555555555 street=\"Douglas Extension\" city=McKenziehaven")
            .unwrap();
        handle_line(&ctx, "submit").unwrap();

        assert!(ctx.form.borrow().is_none());
        assert_eq!(ctx.users.borrow().len(), 2);
        assert_eq!(ctx.users.borrow().get(6).unwrap().name, "Clementine");
    }

    #[test]
    fn test_repl_validation_failure_keeps_form_open() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &[]);

        handle_line(&ctx, "/add name=Al").unwrap();
        let err = handle_line(&ctx, "submit").unwrap_err();
        assert!(err.to_string().contains("Please fix"));

        let slot = ctx.form.borrow();
        let form = slot.as_ref().unwrap();
        assert!(form.errors().len() >= 5);
        assert_eq!(service.calls(), vec![Call::List]);
    }

    #[test]
    fn test_second_form_is_refused_and_cancel_closes() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &[]);
        handle_line(&ctx, "/add").unwrap();
        assert!(handle_line(&ctx, "/add").is_err());
        handle_line(&ctx, "cancel").unwrap();
        assert!(ctx.form.borrow().is_none());
    }

    #[test]
    fn test_one_shot_edit_submits_update() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &["-c", "/edit 5 name=Albert street=Main city=Springfield"]);
        let command = ctx.args.command.clone().unwrap();
        run_once(&ctx, &command).unwrap();

        assert!(matches!(&service.calls()[1], Call::Update(5, u) if u.name == "Albert"));
        assert_eq!(ctx.users.borrow().get(5).unwrap().name, "Albert");
        assert!(ctx.form.borrow().is_none());
    }

    #[test]
    fn test_one_shot_add_with_invalid_fields_fails_without_call() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &["-c", "/add name=Al"]);
        let err = run_once(&ctx, "/add name=Al").unwrap_err();
        assert!(err.to_string().contains("Please fix"));
        assert_eq!(service.calls(), vec![Call::List]);
    }

    #[test]
    fn test_edit_unknown_id_fails() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &[]);
        let err = handle_line(&ctx, "/edit 42").unwrap_err();
        assert!(err.to_string().contains("No user with id 42"));
        assert!(handle_line(&ctx, "/edit abc").is_err());
    }

    #[test]
    fn test_submission_failure_is_generic_and_keeps_form() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &[]);
        handle_line(
            &ctx,
            "/add name=Leanne email=l@april.biz phone=1234567890 street=Kulas city=Gwenborough",
        )
        .unwrap();
        service.failing.set(true);

        let err = handle_line(&ctx, "submit").unwrap_err();
        assert_eq!(err.to_string(), "Error submitting form. Please try again.");
        assert!(ctx.form.borrow().is_some());
        assert!(ctx.users.borrow().is_empty());
    }

    #[test]
    fn test_delete_with_yes_removes_entry() {
        let mut other = al();
        other.id = Some(6);
        let service = Rc::new(MockService::with_users(vec![al(), other]));
        let ctx = context(&service, &["--yes"]);

        handle_line(&ctx, "/delete 5").unwrap();
        assert_eq!(service.calls().last(), Some(&Call::Delete(5)));
        let ids: Vec<_> = ctx.users.borrow().iter().filter_map(|u| u.id).collect();
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn test_one_shot_delete_without_yes_is_refused() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &["-c", "/delete 5"]);
        let err = run_once(&ctx, "/delete 5").unwrap_err();
        assert!(err.to_string().contains("use --yes"));
        assert_eq!(service.calls(), vec![Call::List]);
        assert_eq!(ctx.users.borrow().len(), 1);
    }

    #[test]
    fn test_delete_failure_leaves_list_unchanged() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &["--yes"]);
        service.failing.set(true);
        assert!(handle_line(&ctx, "/delete 5").is_err());
        assert_eq!(ctx.users.borrow().len(), 1);
    }

    #[test]
    fn test_show_fetches_by_id() {
        let service = Rc::new(MockService::with_users(vec![al()]));
        let ctx = context(&service, &[]);
        handle_line(&ctx, "/show 5").unwrap();
        assert_eq!(service.calls().last(), Some(&Call::Get(5)));
        assert!(handle_line(&ctx, "/show 99").is_err());
    }

    #[test]
    fn test_unknown_input() {
        let service = Rc::new(MockService::default());
        let ctx = context(&service, &[]);
        assert!(handle_line(&ctx, "/frobnicate").is_err());
        assert!(handle_line(&ctx, "hello").is_err());
        assert!(handle_line(&ctx, "/exit").unwrap());
    }
}
