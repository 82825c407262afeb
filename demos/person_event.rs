use std::sync::Arc;
use std::thread;
use threaded_events::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Person {
    name: String,
    count: u32,
}

impl_event!(Person);

/// Stands in for a view that may only be touched from the main thread
struct Screen {
    label: &'static str,
}

impl Screen {
    fn show_person(&self, person: &Person) {
        println!(
            "[{}] {} {} (on {:?})",
            self.label,
            person.name,
            person.count,
            thread::current().name().unwrap_or("unnamed")
        );
    }

    fn show_message(&self, message: &String) {
        println!("[{}] {}", self.label, message);
    }
}

impl Subscriber for Screen {
    fn subscriptions(handlers: &mut Handlers<Self>) {
        handlers
            .on(ThreadMode::Main, Screen::show_person)
            .on_posting(Screen::show_message);
    }
}

/// Does slow work off the main thread
struct Archive;

impl Subscriber for Archive {
    fn subscriptions(handlers: &mut Handlers<Self>) {
        handlers.on(ThreadMode::Async, |_: &Archive, person: &Person| {
            println!(
                "[archive] stored {} (on {:?})",
                person.name,
                thread::current().name().unwrap_or("unnamed")
            );
        });
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Testing threaded-events...\n");

    let bus = Arc::new(EventBus::builder().build()?);
    let main = bus.spawn_main_loop()?;

    let screen = Arc::new(Screen { label: "screen" });
    bus.register(&screen)?;
    bus.register(&Arc::new(Archive))?;

    // POSTING handlers run right here
    bus.post(String::from("hello"))?;

    // From a background thread the MAIN handler is queued for the main
    // loop and the ASYNC handler runs on the poster itself.
    let poster = bus.clone();
    thread::Builder::new()
        .name("background".into())
        .spawn(move || {
            poster.post(Person {
                name: "LeoCheung".into(),
                count: 3,
            })
        })?
        .join()
        .map_err(|_| Error::internal("background poster panicked"))??;

    bus.unregister(&screen);
    bus.shutdown()?;
    let executed = main.join()?;

    println!("\n{}", bus.stats());
    println!("Main loop ran {} task(s)", executed);
    Ok(())
}
