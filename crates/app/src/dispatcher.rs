//! Mail dispatcher — bounded worker queue turning rule firings into mail.
//!
//! Jobs are queued on a bounded [`mpsc`] channel shared by a fixed number
//! of worker tasks. Enqueueing waits for free capacity. Each job reports
//! how it ended through a [`DispatchTicket`]. Failures are terminal: they
//! are logged and pushed to the mutation's notice sink, never retried.

use std::sync::{Arc, Mutex, PoisonError};

use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::{RecordId, RuleId, TemplateId};
use hrmail_domain::mail::{Attachment, OutgoingMail, split_recipients};
use hrmail_domain::record::Record;
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::template::MailTemplate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::context::{Notice, NoticeSink};
use crate::handlers::CompiledRule;
use crate::ports::{MailTransport, RecordRepository, TemplateRepository};
use crate::render::{MailRenderer, mail_context};
use crate::resolver::resolve_recipients;

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub capacity: usize,
    pub from_address: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 64,
            from_address: "noreply@localhost".to_string(),
        }
    }
}

/// How a queued dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { to: String, cc: Vec<String> },
    Skipped { reason: String },
    Failed { error: String },
}

/// Handle on one queued dispatch.
#[derive(Debug)]
pub struct DispatchTicket {
    rule_id: RuleId,
    record_id: RecordId,
    receiver: oneshot::Receiver<DispatchOutcome>,
}

impl DispatchTicket {
    #[must_use]
    pub fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    #[must_use]
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    /// Wait for the job to finish.
    pub async fn outcome(self) -> DispatchOutcome {
        self.receiver.await.unwrap_or_else(|_| DispatchOutcome::Failed {
            error: "dispatch was dropped before completing".to_string(),
        })
    }
}

/// One rule firing for one record.
#[derive(Debug)]
pub struct MailJob {
    pub rule: Arc<CompiledRule>,
    pub record: Record,
    pub notices: Option<NoticeSink>,
}

struct Envelope {
    job: MailJob,
    reply: oneshot::Sender<DispatchOutcome>,
}

struct Worker<TR, DR, MT> {
    templates: Arc<TR>,
    records: Arc<DR>,
    transport: Arc<MT>,
    registry: Arc<ModelRegistry>,
    renderer: MailRenderer,
    from_address: String,
}

/// Front of the worker queue.
pub struct MailDispatcher {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MailDispatcher {
    /// Spawn `config.workers` worker tasks on the current runtime.
    pub fn start<TR, DR, MT>(
        config: &DispatcherConfig,
        templates: Arc<TR>,
        records: Arc<DR>,
        transport: Arc<MT>,
        registry: Arc<ModelRegistry>,
    ) -> Self
    where
        TR: TemplateRepository + Send + Sync + 'static,
        DR: RecordRepository + Send + Sync + 'static,
        MT: MailTransport + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let worker = Arc::new(Worker {
            templates,
            records,
            transport,
            registry,
            renderer: MailRenderer::new(),
            from_address: config.from_address.clone(),
        });

        let handles = (0..config.workers.max(1))
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    tracing::debug!(worker = index, "mail worker started");
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(Envelope { job, reply }) = next else {
                            break;
                        };
                        let outcome = worker.run(job).await;
                        let _ = reply.send(outcome);
                    }
                    tracing::debug!(worker = index, "mail worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: tokio::sync::Mutex::new(handles),
        }
    }

    /// Queue a job, waiting while the queue is full.
    ///
    /// After [`shutdown`](Self::shutdown) the ticket resolves to
    /// [`DispatchOutcome::Failed`] immediately.
    pub async fn enqueue(&self, job: MailJob) -> DispatchTicket {
        let (reply, receiver) = oneshot::channel();
        let ticket = DispatchTicket {
            rule_id: job.rule.id(),
            record_id: job.record.id,
            receiver,
        };
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            let _ = reply.send(DispatchOutcome::Failed {
                error: "mail dispatcher is shut down".to_string(),
            });
            return ticket;
        };
        if let Err(mpsc::error::SendError(envelope)) = sender.send(Envelope { job, reply }).await {
            let _ = envelope.reply.send(DispatchOutcome::Failed {
                error: "mail dispatcher is shut down".to_string(),
            });
        }
        ticket
    }

    /// Stop accepting jobs and wait for queued ones to drain.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "mail worker panicked");
            }
        }
    }
}

impl<TR, DR, MT> Worker<TR, DR, MT>
where
    TR: TemplateRepository + Send + Sync,
    DR: RecordRepository + Send + Sync,
    MT: MailTransport + Send + Sync,
{
    #[tracing::instrument(skip_all, fields(rule_id = %job.rule.id(), record_id = %job.record.id))]
    async fn run(&self, job: MailJob) -> DispatchOutcome {
        let outcome = match self.deliver(&job).await {
            Ok(outcome) => outcome,
            Err(err) => DispatchOutcome::Failed {
                error: describe(&err),
            },
        };
        let title = &job.rule.rule.title;
        match &outcome {
            DispatchOutcome::Sent { to, cc } => {
                tracing::info!(to = %to, cc = cc.len(), "automation mail sent");
            }
            DispatchOutcome::Skipped { reason } => {
                tracing::warn!(reason = %reason, "automation mail skipped");
                if let Some(sink) = &job.notices {
                    sink.push(Notice::warning(format!("{title}: {reason}")));
                }
            }
            DispatchOutcome::Failed { error } => {
                tracing::error!(error = %error, "automation mail failed");
                if let Some(sink) = &job.notices {
                    sink.push(Notice::error(format!("{title}: {error}")));
                }
            }
        }
        outcome
    }

    async fn deliver(&self, job: &MailJob) -> Result<DispatchOutcome, HrMailError> {
        let rule = &job.rule.rule;
        let recipients =
            resolve_recipients(&*self.records, &self.registry, &job.record, &job.rule.recipients)
                .await;
        let Some((to, cc)) = split_recipients(&recipients, &rule.also_sent_to) else {
            return Ok(DispatchOutcome::Skipped {
                reason: "no recipient resolved to a mail address".to_string(),
            });
        };

        let template = self.template(rule.template_id).await?;
        let context = mail_context(
            &*self.records,
            &self.registry,
            &job.record,
            rule,
            recipients.first(),
        )
        .await;
        let subject = match &template.subject {
            Some(source) if !source.trim().is_empty() => {
                self.renderer.render(source, &context)?.trim().to_string()
            }
            _ => rule.title.clone(),
        };
        let body_html = self.renderer.render(&template.body, &context)?;

        let mut attachments = Vec::with_capacity(rule.attachment_template_ids.len());
        for id in &rule.attachment_template_ids {
            let document = self.template(*id).await?;
            attachments.push(Attachment::html(
                document.attachment_filename(),
                self.renderer.render(&document.body, &context)?,
            ));
        }

        self.transport
            .send(OutgoingMail {
                rule_id: rule.id,
                record_id: job.record.id,
                from: self.from_address.clone(),
                to: to.clone(),
                cc: cc.clone(),
                subject,
                body_html,
                attachments,
                created_at: hrmail_domain::time::now(),
            })
            .await?;
        Ok(DispatchOutcome::Sent { to, cc })
    }

    async fn template(&self, id: TemplateId) -> Result<MailTemplate, HrMailError> {
        self.templates.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "MailTemplate",
                id: id.to_string(),
            }
            .into()
        })
    }
}

/// Error message including its source chain.
fn describe(err: &HrMailError) -> String {
    use std::error::Error as _;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
