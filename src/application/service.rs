use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{
    Person, PersonBalance, PersonId, Transaction, TransactionDraft, TransactionId,
    TransactionWithPerson,
};
use crate::storage::Repository;

use super::LedgerError;

/// The single gateway to the ledger store, for any client (TUI, GUI,
/// API, etc.).
///
/// All storage access funnels through one background writer task that
/// exclusively owns the [`Repository`]: mutations and point lookups are
/// processed in arrival order, so no read ever observes a partially
/// applied write and no two writes interleave. Mutating calls enqueue a
/// command and return a [`Completion`] immediately; lookups are `async`
/// and resolve once the writer task has produced the answer.
///
/// Handles are cheap clones of the command channel. The writer task stops
/// once every handle has been dropped.
#[derive(Clone)]
pub struct LedgerService {
    commands: mpsc::UnboundedSender<Command>,
}

/// Handle to an enqueued mutation. Awaiting the outcome is optional:
/// dropping the handle detaches from the result without cancelling the
/// write.
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, LedgerError>>,
}

impl<T> Completion<T> {
    /// Wait for the mutation to commit or fail.
    pub async fn wait(self) -> Result<T, LedgerError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::ServiceStopped),
        }
    }
}

/// A live query result stream. The first call to [`next`] yields the
/// snapshot taken at subscription time; every committed mutation after
/// that pushes one fresh snapshot. Dropping (or [`cancel`]-ing) the
/// subscription stops further deliveries to this subscriber only.
///
/// The stream ends (`next` returns `None`) when the initial snapshot
/// could not be read from the store, or when the service has stopped.
///
/// [`next`]: Subscription::next
/// [`cancel`]: Subscription::cancel
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Receive the next snapshot.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Detach from the stream. Equivalent to dropping the subscription.
    pub fn cancel(self) {}
}

enum Command {
    AddPerson {
        name: String,
        reply: oneshot::Sender<Result<Person, LedgerError>>,
    },
    AddTransaction {
        draft: TransactionDraft,
        reply: oneshot::Sender<Result<Transaction, LedgerError>>,
    },
    UpdateTransaction {
        txn: Transaction,
        reply: oneshot::Sender<Result<Transaction, LedgerError>>,
    },
    RemoveTransaction {
        id: TransactionId,
        reply: oneshot::Sender<Result<(), LedgerError>>,
    },
    PersonIdByName {
        name: String,
        reply: oneshot::Sender<Result<PersonId, LedgerError>>,
    },
    PersonExists {
        name: String,
        reply: oneshot::Sender<Result<bool, LedgerError>>,
    },
    TransactionById {
        id: TransactionId,
        reply: oneshot::Sender<Result<TransactionWithPerson, LedgerError>>,
    },
    Balances {
        reply: oneshot::Sender<Result<Vec<PersonBalance>, LedgerError>>,
    },
    Transactions {
        person: Option<String>,
        reply: oneshot::Sender<Result<Vec<TransactionWithPerson>, LedgerError>>,
    },
    ObserveBalances {
        sender: mpsc::UnboundedSender<Vec<PersonBalance>>,
    },
    ObserveTransactions {
        person: Option<String>,
        sender: mpsc::UnboundedSender<Vec<TransactionWithPerson>>,
    },
}

impl LedgerService {
    /// Initialize a database at the given path (created if missing) and
    /// start the service.
    pub async fn init(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::start(repo))
    }

    /// Connect to an existing database and start the service.
    pub async fn connect(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::start(repo))
    }

    /// Start the service over an already-open repository, spawning the
    /// writer task. Must be called from within a tokio runtime.
    pub fn start(repo: Repository) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let writer = Writer {
            repo,
            balance_subscribers: Vec::new(),
            transaction_subscribers: Vec::new(),
        };
        tokio::spawn(writer.run(inbox));
        Self { commands }
    }

    // ========================
    // Mutations (enqueue and return)
    // ========================

    /// Look up a person by name, creating the record if the name is new.
    /// Blank names are rejected.
    pub fn add_person(&self, name: impl Into<String>) -> Completion<Person> {
        let name = name.into();
        self.enqueue(|reply| Command::AddPerson { name, reply })
    }

    /// Record a new transaction. Fails if the amount is zero or the
    /// referenced person does not exist.
    pub fn add_transaction(&self, draft: TransactionDraft) -> Completion<Transaction> {
        self.enqueue(|reply| Command::AddTransaction { draft, reply })
    }

    /// Overwrite an existing transaction with the given record.
    pub fn update_transaction(&self, txn: Transaction) -> Completion<Transaction> {
        self.enqueue(|reply| Command::UpdateTransaction { txn, reply })
    }

    /// Delete a transaction by id.
    pub fn remove_transaction(&self, id: TransactionId) -> Completion<()> {
        self.enqueue(|reply| Command::RemoveTransaction { id, reply })
    }

    // ========================
    // Point lookups (resolved on the writer task)
    // ========================

    /// Resolve a person's id from their (case-insensitive) name.
    pub async fn person_id(&self, name: &str) -> Result<PersonId, LedgerError> {
        let name = name.to_string();
        self.enqueue(|reply| Command::PersonIdByName { name, reply })
            .wait()
            .await
    }

    /// Check whether a person with the given name exists.
    pub async fn person_exists(&self, name: &str) -> Result<bool, LedgerError> {
        let name = name.to_string();
        self.enqueue(|reply| Command::PersonExists { name, reply })
            .wait()
            .await
    }

    /// Get a transaction by id, joined with its person.
    pub async fn transaction(&self, id: TransactionId) -> Result<TransactionWithPerson, LedgerError> {
        self.enqueue(|reply| Command::TransactionById { id, reply })
            .wait()
            .await
    }

    /// One-shot snapshot of all persons with their monetary and item sums.
    pub async fn balances(&self) -> Result<Vec<PersonBalance>, LedgerError> {
        self.enqueue(|reply| Command::Balances { reply }).wait().await
    }

    /// One-shot snapshot of the transaction history, most recent first,
    /// optionally filtered to one person by name.
    pub async fn transactions(
        &self,
        person: Option<String>,
    ) -> Result<Vec<TransactionWithPerson>, LedgerError> {
        self.enqueue(|reply| Command::Transactions { person, reply })
            .wait()
            .await
    }

    // ========================
    // Live queries
    // ========================

    /// Subscribe to the balances list. Yields the current snapshot first,
    /// then one fresh snapshot after every committed mutation.
    pub fn observe_balances(&self) -> Subscription<Vec<PersonBalance>> {
        let (sender, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::ObserveBalances { sender });
        Subscription { rx }
    }

    /// Subscribe to the transaction history, optionally filtered to one
    /// person by name. Yields the current snapshot first, then one fresh
    /// snapshot after every committed mutation.
    pub fn observe_transactions(
        &self,
        person: Option<String>,
    ) -> Subscription<Vec<TransactionWithPerson>> {
        let (sender, rx) = mpsc::unbounded_channel();
        let _ = self
            .commands
            .send(Command::ObserveTransactions { person, sender });
        Subscription { rx }
    }

    fn enqueue<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T, LedgerError>>) -> Command,
    ) -> Completion<T> {
        let (reply, rx) = oneshot::channel();
        // A send failure means the writer task is gone; the dropped reply
        // sender resolves the completion to ServiceStopped.
        let _ = self.commands.send(command(reply));
        Completion { rx }
    }
}

/// The background execution context: exclusive owner of the repository,
/// drains the command channel in arrival order.
struct Writer {
    repo: Repository,
    balance_subscribers: Vec<mpsc::UnboundedSender<Vec<PersonBalance>>>,
    transaction_subscribers: Vec<(Option<String>, mpsc::UnboundedSender<Vec<TransactionWithPerson>>)>,
}

impl Writer {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            self.handle(command).await;
        }
        tracing::debug!("ledger writer task stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::AddPerson { name, reply } => {
                let result = self.add_person(&name).await;
                self.finish_mutation(result, reply).await;
            }
            Command::AddTransaction { draft, reply } => {
                let result = self.add_transaction(draft).await;
                self.finish_mutation(result, reply).await;
            }
            Command::UpdateTransaction { txn, reply } => {
                let result = self.update_transaction(txn).await;
                self.finish_mutation(result, reply).await;
            }
            Command::RemoveTransaction { id, reply } => {
                let result = self.remove_transaction(id).await;
                self.finish_mutation(result, reply).await;
            }
            Command::PersonIdByName { name, reply } => {
                let result = self.person_id_by_name(&name).await;
                let _ = reply.send(result);
            }
            Command::PersonExists { name, reply } => {
                let result = self.repo.person_exists(&name).await.map_err(Into::into);
                let _ = reply.send(result);
            }
            Command::TransactionById { id, reply } => {
                let result = self.transaction_by_id(id).await;
                let _ = reply.send(result);
            }
            Command::Balances { reply } => {
                let result = self.repo.persons_with_balances().await.map_err(Into::into);
                let _ = reply.send(result);
            }
            Command::Transactions { person, reply } => {
                let result = self
                    .repo
                    .transactions(person.as_deref())
                    .await
                    .map_err(Into::into);
                let _ = reply.send(result);
            }
            Command::ObserveBalances { sender } => {
                match self.repo.persons_with_balances().await {
                    Ok(snapshot) => {
                        if sender.send(snapshot).is_ok() {
                            self.balance_subscribers.push(sender);
                        }
                    }
                    // Dropping the sender ends the subscriber's stream,
                    // which is its signal that the store is unreadable.
                    Err(err) => tracing::error!("initial balances snapshot failed: {err:#}"),
                }
            }
            Command::ObserveTransactions { person, sender } => {
                match self.repo.transactions(person.as_deref()).await {
                    Ok(snapshot) => {
                        if sender.send(snapshot).is_ok() {
                            self.transaction_subscribers.push((person, sender));
                        }
                    }
                    Err(err) => tracing::error!("initial transactions snapshot failed: {err:#}"),
                }
            }
        }
    }

    /// Broadcast fresh snapshots on success, before the caller observes
    /// the outcome; failed mutations never notify.
    async fn finish_mutation<T>(
        &mut self,
        result: Result<T, LedgerError>,
        reply: oneshot::Sender<Result<T, LedgerError>>,
    ) {
        match &result {
            Ok(_) => self.broadcast().await,
            Err(err) => tracing::error!("mutation failed: {err}"),
        }
        let _ = reply.send(result);
    }

    async fn broadcast(&mut self) {
        self.balance_subscribers.retain(|sender| !sender.is_closed());
        if !self.balance_subscribers.is_empty() {
            match self.repo.persons_with_balances().await {
                Ok(snapshot) => {
                    for sender in &self.balance_subscribers {
                        let _ = sender.send(snapshot.clone());
                    }
                }
                Err(err) => tracing::error!("balances refresh failed: {err:#}"),
            }
        }

        self.transaction_subscribers
            .retain(|(_, sender)| !sender.is_closed());
        for (person, sender) in &self.transaction_subscribers {
            match self.repo.transactions(person.as_deref()).await {
                Ok(snapshot) => {
                    let _ = sender.send(snapshot);
                }
                Err(err) => tracing::error!("transactions refresh failed: {err:#}"),
            }
        }
    }

    async fn add_person(&self, name: &str) -> Result<Person, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyPersonName);
        }
        Ok(self.repo.insert_person(name).await?)
    }

    async fn add_transaction(&self, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        if draft.amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if self.repo.person_by_id(draft.person_id).await?.is_none() {
            return Err(LedgerError::MissingPerson(draft.person_id));
        }

        let txn = Transaction::new(
            draft.person_id,
            draft.amount,
            draft.is_monetary,
            draft.description,
            draft.timestamp.unwrap_or_else(Utc::now),
        );
        self.repo.insert_transaction(&txn).await?;
        Ok(txn)
    }

    async fn update_transaction(&self, txn: Transaction) -> Result<Transaction, LedgerError> {
        if txn.amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if self.repo.person_by_id(txn.person_id).await?.is_none() {
            return Err(LedgerError::MissingPerson(txn.person_id));
        }
        if !self.repo.update_transaction(&txn).await? {
            return Err(LedgerError::TransactionNotFound(txn.id));
        }
        Ok(txn)
    }

    async fn remove_transaction(&self, id: TransactionId) -> Result<(), LedgerError> {
        if !self.repo.delete_transaction(id).await? {
            return Err(LedgerError::TransactionNotFound(id));
        }
        Ok(())
    }

    async fn person_id_by_name(&self, name: &str) -> Result<PersonId, LedgerError> {
        self.repo
            .person_by_name(name)
            .await?
            .map(|person| person.id)
            .ok_or_else(|| LedgerError::PersonNotFound(name.to_string()))
    }

    async fn transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<TransactionWithPerson, LedgerError> {
        self.repo
            .transaction_by_id(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }
}
