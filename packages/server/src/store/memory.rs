use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use common::{ExerciseState, SubmissionState};

use super::{
    Accounts, ExerciseCatalog, NewIteration, Progress, ReactionKind, Reviews, Social, StoreError,
    VersionChain, new_submission_key,
};
use crate::chain;
use crate::entity::{
    acl, conversation_subscription, exercise, lifecycle_event, look, notification, reaction,
    submission, submission_view, user, user_exercise,
};

#[derive(Default)]
struct Tables {
    seq: i32,
    users: Vec<user::Model>,
    exercises: Vec<exercise::Model>,
    user_exercises: Vec<user_exercise::Model>,
    submissions: Vec<submission::Model>,
    reactions: Vec<reaction::Model>,
    views: Vec<submission_view::Model>,
    looks: Vec<look::Model>,
    notifications: Vec<notification::Model>,
    lifecycle_events: Vec<lifecycle_event::Model>,
    acls: Vec<acl::Model>,
    subscriptions: Vec<conversation_subscription::Model>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.seq += 1;
        self.seq
    }

    fn user_exercise_index(&self, user_id: i32, track: &str, slug: &str) -> Option<usize> {
        self.user_exercises
            .iter()
            .position(|ue| ue.user_id == user_id && ue.track == track && ue.slug == slug)
    }

    fn find_or_create_user_exercise(&mut self, user_id: i32, track: &str, slug: &str) -> usize {
        if let Some(idx) = self.user_exercise_index(user_id, track, slug) {
            return idx;
        }
        let id = self.next_id();
        self.user_exercises.push(user_exercise::Model {
            id,
            user_id,
            track: track.to_string(),
            slug: slug.to_string(),
            iteration_count: 0,
            state: ExerciseState::Unstarted,
            skipped_at: None,
            last_iteration_at: None,
            completed_at: None,
            created_at: Utc::now(),
        });
        self.user_exercises.len() - 1
    }

    fn head_index(&self, user_exercise_id: i32) -> Option<usize> {
        self.submissions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.user_exercise_id == user_exercise_id)
            .max_by_key(|(_, s)| s.version)
            .map(|(idx, _)| idx)
    }

    fn submission_index(&self, submission_id: i32) -> Result<usize, StoreError> {
        self.submissions
            .iter()
            .position(|s| s.id == submission_id)
            .ok_or_else(|| StoreError::NotFound(format!("submission {submission_id}")))
    }
}

/// Store kept entirely in process memory. Used for local development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create an account. Accounts are otherwise owned by the identity service.
    pub fn insert_user(
        &self,
        username: &str,
        key: &str,
        guest: bool,
    ) -> Result<user::Model, StoreError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let model = user::Model {
            id,
            username: username.to_string(),
            key: key.to_string(),
            guest,
            created_at: Utc::now(),
        };
        t.users.push(model.clone());
        Ok(model)
    }

    pub fn notifications_for(&self, user_id: i32) -> Result<Vec<notification::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn lifecycle_events_for(
        &self,
        user_id: i32,
    ) -> Result<Vec<lifecycle_event::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.lifecycle_events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn has_access(&self, user_id: i32, track: &str, slug: &str) -> Result<bool, StoreError> {
        let t = self.lock()?;
        Ok(t.acls
            .iter()
            .any(|a| a.user_id == user_id && a.track == track && a.slug == slug))
    }

    pub fn view_count(&self, submission_id: i32, user_id: i32) -> Result<i32, StoreError> {
        let t = self.lock()?;
        Ok(t.views
            .iter()
            .find(|v| v.submission_id == submission_id && v.user_id == user_id)
            .map_or(0, |v| v.count))
    }

    pub fn is_looking(&self, user_exercise_id: i32, user_id: i32) -> Result<bool, StoreError> {
        let t = self.lock()?;
        Ok(t.looks
            .iter()
            .any(|l| l.user_exercise_id == user_exercise_id && l.user_id == user_id))
    }
}

#[async_trait]
impl ExerciseCatalog for MemoryStore {
    async fn exercise(
        &self,
        track: &str,
        slug: &str,
    ) -> Result<Option<exercise::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.exercises
            .iter()
            .find(|e| e.track == track && e.slug == slug)
            .cloned())
    }

    async fn register_exercise(
        &self,
        track: &str,
        slug: &str,
        name: &str,
    ) -> Result<bool, StoreError> {
        let mut t = self.lock()?;
        if t.exercises.iter().any(|e| e.track == track && e.slug == slug) {
            return Ok(false);
        }
        let id = t.next_id();
        t.exercises.push(exercise::Model {
            id,
            track: track.to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
        });
        Ok(true)
    }
}

#[async_trait]
impl Accounts for MemoryStore {
    async fn user_by_key(&self, key: &str) -> Result<Option<user::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.users.iter().find(|u| u.key == key).cloned())
    }

    async fn user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl VersionChain for MemoryStore {
    async fn head(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError> {
        let t = self.lock()?;
        let Some(ue) = t.user_exercise_index(user_id, track, slug) else {
            return Ok(None);
        };
        Ok(t.head_index(t.user_exercises[ue].id)
            .map(|idx| t.submissions[idx].clone()))
    }

    async fn chain(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError> {
        let t = self.lock()?;
        let mut versions: Vec<_> = t
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id && s.track == track && s.slug == slug)
            .cloned()
            .collect();
        versions.sort_by_key(|s| s.version);
        Ok(versions)
    }

    async fn submission_by_key(&self, key: &str) -> Result<Option<submission::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.submissions.iter().find(|s| s.key == key).cloned())
    }

    async fn append(&self, iteration: NewIteration) -> Result<submission::Model, StoreError> {
        let code = serde_json::to_value(&iteration.code)?;
        let mut t = self.lock()?;
        let now = Utc::now();

        let ue_idx =
            t.find_or_create_user_exercise(iteration.user_id, &iteration.track, &iteration.slug);
        let ue_id = t.user_exercises[ue_idx].id;

        let prior = t.head_index(ue_id);
        if chain::duplicate(prior.map(|idx| &t.submissions[idx]), &iteration.code) {
            return Err(StoreError::Duplicate);
        }
        let (version, prior_id) = match prior {
            Some(idx) => {
                let head = &mut t.submissions[idx];
                head.state = SubmissionState::Superseded;
                (head.version + 1, Some(head.id))
            }
            None => (1, None),
        };

        let id = t.next_id();
        let model = submission::Model {
            id,
            key: new_submission_key(),
            user_id: iteration.user_id,
            user_exercise_id: ue_id,
            track: iteration.track,
            slug: iteration.slug,
            code,
            comment: iteration.comment,
            version,
            state: SubmissionState::Pending,
            prior_id,
            created_at: now,
            done_at: None,
        };
        t.submissions.push(model.clone());

        let ue = &mut t.user_exercises[ue_idx];
        ue.iteration_count = version;
        ue.state = ExerciseState::Active;
        ue.last_iteration_at = Some(now);

        Ok(model)
    }

    async fn remove_head(
        &self,
        submission_id: i32,
    ) -> Result<Option<submission::Model>, StoreError> {
        let mut t = self.lock()?;
        let idx = t.submission_index(submission_id)?;
        let target = t.submissions[idx].clone();

        if t.head_index(target.user_exercise_id) != Some(idx) {
            return Err(StoreError::NotHead(target.key));
        }

        t.submissions.remove(idx);
        t.reactions.retain(|r| r.submission_id != target.id);
        t.views.retain(|v| v.submission_id != target.id);
        t.notifications.retain(|n| n.submission_id != target.id);

        let prior = match target.prior_id {
            Some(prior_id) => {
                let prior_idx = t.submission_index(prior_id)?;
                let prior = &mut t.submissions[prior_idx];
                if target.state == SubmissionState::Pending {
                    prior.state = SubmissionState::Pending;
                    prior.done_at = None;
                }
                Some(prior.clone())
            }
            None => None,
        };

        if let Some(ue) = t
            .user_exercises
            .iter_mut()
            .find(|ue| ue.id == target.user_exercise_id)
        {
            ue.iteration_count = prior.as_ref().map_or(0, |p| p.version);
        }

        Ok(prior)
    }
}

#[async_trait]
impl Progress for MemoryStore {
    async fn user_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.user_exercise_index(user_id, track, slug)
            .map(|idx| t.user_exercises[idx].clone()))
    }

    async fn user_exercises(&self, user_id: i32) -> Result<Vec<user_exercise::Model>, StoreError> {
        let t = self.lock()?;
        let mut exercises: Vec<_> = t
            .user_exercises
            .iter()
            .filter(|ue| ue.user_id == user_id)
            .cloned()
            .collect();
        exercises.sort_by(|a, b| (&a.track, &a.slug).cmp(&(&b.track, &b.slug)));
        Ok(exercises)
    }

    async fn skip_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<user_exercise::Model, StoreError> {
        let mut t = self.lock()?;
        let idx = t.find_or_create_user_exercise(user_id, track, slug);
        let ue = &mut t.user_exercises[idx];
        ue.skipped_at = Some(Utc::now());
        Ok(ue.clone())
    }

    async fn set_state(
        &self,
        submission_id: i32,
        state: SubmissionState,
    ) -> Result<submission::Model, StoreError> {
        let mut t = self.lock()?;
        let idx = t.submission_index(submission_id)?;
        let sub = &mut t.submissions[idx];
        sub.state = state;
        sub.done_at = (state == SubmissionState::Done).then(Utc::now);
        Ok(sub.clone())
    }

    async fn find_done(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError> {
        let t = self.lock()?;
        Ok(t.submissions
            .iter()
            .filter(|s| {
                s.user_id == user_id
                    && s.track == track
                    && s.slug == slug
                    && s.state == SubmissionState::Done
            })
            .max_by_key(|s| s.version)
            .cloned())
    }

    async fn reconcile(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError> {
        let mut t = self.lock()?;
        let Some(ue_idx) = t.user_exercise_index(user_id, track, slug) else {
            return Ok(None);
        };
        let head = t
            .head_index(t.user_exercises[ue_idx].id)
            .map(|idx| t.submissions[idx].clone());

        let ue = &mut t.user_exercises[ue_idx];
        ue.iteration_count = head.as_ref().map_or(0, |h| h.version);
        ue.state = ExerciseState::from_head(head.as_ref().map(|h| h.state));
        ue.last_iteration_at = head.as_ref().map(|h| h.created_at);
        ue.completed_at = head.as_ref().and_then(|h| h.done_at);
        Ok(Some(ue.clone()))
    }

    async fn record_lifecycle_event(&self, user_id: i32, key: &str) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        t.lifecycle_events.push(lifecycle_event::Model {
            id,
            user_id,
            key: key.to_string(),
            happened_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl Reviews for MemoryStore {
    async fn set_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
        on: bool,
    ) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let matches = |r: &reaction::Model| {
            r.submission_id == submission_id && r.user_id == user_id && r.kind == kind.as_str()
        };
        if !on {
            t.reactions.retain(|r| !matches(r));
        } else if !t.reactions.iter().any(matches) {
            t.reactions.push(reaction::Model {
                submission_id,
                user_id,
                kind: kind.as_str().to_string(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn has_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
    ) -> Result<bool, StoreError> {
        let t = self.lock()?;
        Ok(t.reactions.iter().any(|r| {
            r.submission_id == submission_id && r.user_id == user_id && r.kind == kind.as_str()
        }))
    }

    async fn record_view(&self, submission_id: i32, user_id: i32) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let now = Utc::now();
        match t
            .views
            .iter_mut()
            .find(|v| v.submission_id == submission_id && v.user_id == user_id)
        {
            Some(view) => {
                view.count += 1;
                view.last_viewed_at = now;
            }
            None => t.views.push(submission_view::Model {
                submission_id,
                user_id,
                count: 1,
                last_viewed_at: now,
            }),
        }
        Ok(())
    }

    async fn check_look(&self, user_exercise_id: i32, user_id: i32) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let now = Utc::now();
        match t
            .looks
            .iter_mut()
            .find(|l| l.user_exercise_id == user_exercise_id && l.user_id == user_id)
        {
            Some(look) => look.looked_at = now,
            None => t.looks.push(look::Model {
                user_exercise_id,
                user_id,
                looked_at: now,
            }),
        }
        Ok(())
    }

    async fn mark_notifications_read(
        &self,
        submission_id: i32,
        user_id: i32,
    ) -> Result<u64, StoreError> {
        let mut t = self.lock()?;
        let mut changed = 0;
        for n in t
            .notifications
            .iter_mut()
            .filter(|n| n.submission_id == submission_id && n.user_id == user_id && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn review_queue(
        &self,
        viewer_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError> {
        let t = self.lock()?;
        let muted: Vec<i32> = t
            .reactions
            .iter()
            .filter(|r| r.user_id == viewer_id && r.kind == reaction::MUTE)
            .map(|r| r.submission_id)
            .collect();
        let mut queue: Vec<_> = t
            .submissions
            .iter()
            .filter(|s| {
                s.track == track
                    && s.slug == slug
                    && s.state.is_reviewable()
                    && s.user_id != viewer_id
                    && !muted.contains(&s.id)
            })
            .cloned()
            .collect();
        queue.sort_by_key(|s| s.id);
        Ok(queue)
    }
}

#[async_trait]
impl Social for MemoryStore {
    async fn grant_access(&self, user_id: i32, track: &str, slug: &str) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if !t
            .acls
            .iter()
            .any(|a| a.user_id == user_id && a.track == track && a.slug == slug)
        {
            t.acls.push(acl::Model {
                user_id,
                track: track.to_string(),
                slug: slug.to_string(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn subscribe(&self, user_id: i32, user_exercise_id: i32) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if !t
            .subscriptions
            .iter()
            .any(|s| s.user_id == user_id && s.user_exercise_id == user_exercise_id)
        {
            t.subscriptions.push(conversation_subscription::Model {
                user_id,
                user_exercise_id,
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn subscribers(&self, user_exercise_id: i32) -> Result<Vec<i32>, StoreError> {
        let t = self.lock()?;
        Ok(t.subscriptions
            .iter()
            .filter(|s| s.user_exercise_id == user_exercise_id)
            .map(|s| s.user_id)
            .collect())
    }

    async fn add_notification(
        &self,
        user_id: i32,
        submission_id: i32,
        regarding: &str,
        actor_id: i32,
    ) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        t.notifications.push(notification::Model {
            id,
            user_id,
            submission_id,
            regarding: regarding.to_string(),
            actor_id,
            read: false,
            created_at: Utc::now(),
        });
        Ok(())
    }
}
