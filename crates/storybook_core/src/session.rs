//! crates/storybook_core/src/session.rs
//!
//! The authoring-session state machine. A `StorySession` owns the mutable
//! page and character collections for one story and exposes intention-revealing
//! mutation operations, so the invariants (contiguous page numbering, roster
//! membership, monotonic illustration cursor) are enforced at the mutation
//! boundary rather than left to callers.

use crate::domain::{AudioClip, Character, CharacterAnalysis, PageStub, StoredImage, StoryPage};
use uuid::Uuid;

/// The wizard stages. Data flows strictly forward; the gallery is a
/// stateless side surface and not a stage of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    Prompt,
    Outline,
    CharacterCreation,
    CreatingPages,
    Finished,
}

impl std::fmt::Display for WizardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WizardStage::Prompt => "prompt",
            WizardStage::Outline => "outline",
            WizardStage::CharacterCreation => "character_creation",
            WizardStage::CreatingPages => "creating_pages",
            WizardStage::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Errors produced by session mutations. These are state-machine violations,
/// not transport failures; the web layer maps them to 4xx responses.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("This action is not available in the {found} stage (expected {expected})")]
    WrongStage {
        expected: &'static str,
        found: WizardStage,
    },
    #[error("Page index {0} is out of range")]
    PageOutOfRange(usize),
    #[error("No character named '{0}' exists in this story")]
    UnknownCharacter(String),
    #[error("The outline contained no pages")]
    EmptyOutline,
    #[error("Every character needs a portrait before illustration can start")]
    CharactersNotReady,
    #[error("A newer illustration was requested for this page; this result was discarded")]
    StaleGeneration,
    #[error("There is no illustration waiting for approval")]
    NoPendingIllustration,
}

/// The full mutable state of one story being authored, from premise to
/// finished book. Owned by the session store; handlers never patch the
/// collections directly.
#[derive(Debug, Clone)]
pub struct StorySession {
    id: Uuid,
    title: String,
    premise: String,
    stage: WizardStage,
    pages: Vec<StoryPage>,
    characters: Vec<Character>,
    current_page_index: usize,
    /// Bumped on every illustration request; a completed call is only
    /// accepted while its token is still current (last submitted wins).
    illustration_generation: u64,
    pending_illustration: Option<StoredImage>,
}

impl StorySession {
    pub fn new(premise: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            premise: premise.into(),
            stage: WizardStage::Prompt,
            pages: Vec::new(),
            characters: Vec::new(),
            current_page_index: 0,
            illustration_generation: 0,
            pending_illustration: None,
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn premise(&self) -> &str {
        &self.premise
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn pages(&self) -> &[StoryPage] {
        &self.pages
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn current_page_index(&self) -> usize {
        self.current_page_index
    }

    pub fn pending_illustration(&self) -> Option<&StoredImage> {
        self.pending_illustration.as_ref()
    }

    /// The illustration of the first page, used as the gallery cover.
    pub fn cover_image(&self) -> Option<&StoredImage> {
        self.pages.first().and_then(|p| p.illustration.as_ref())
    }

    pub fn has_narration(&self) -> bool {
        self.pages.iter().any(|p| p.narration.is_some())
    }

    // --- Outline stage ---

    /// Commits a generated outline and moves the session from `Prompt` to
    /// `Outline`. Entries lacking a page number are assigned their 1-based
    /// position, regardless of what the service returned.
    pub fn apply_outline(&mut self, stubs: Vec<PageStub>) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::Prompt, "prompt")?;
        if stubs.is_empty() {
            return Err(SessionError::EmptyOutline);
        }
        self.pages = stubs
            .into_iter()
            .enumerate()
            .map(|(i, stub)| StoryPage::new(stub.page.unwrap_or(i as u32 + 1), stub.text))
            .collect();
        self.renumber_pages();
        self.stage = WizardStage::Outline;
        Ok(())
    }

    /// Edits one page's narrative text. Allowed while drafting the outline
    /// and while illustrating (the page creator lets the text be tweaked
    /// right up to approval).
    pub fn set_page_text(&mut self, index: usize, text: impl Into<String>) -> Result<(), SessionError> {
        match self.stage {
            WizardStage::Outline | WizardStage::CreatingPages => {}
            found => {
                return Err(SessionError::WrongStage {
                    expected: "outline or creating_pages",
                    found,
                })
            }
        }
        let page = self
            .pages
            .get_mut(index)
            .ok_or(SessionError::PageOutOfRange(index))?;
        page.text = text.into();
        Ok(())
    }

    /// Deletes a page pre-illustration and renumbers the remainder so page
    /// numbers stay contiguous starting at 1.
    pub fn remove_page(&mut self, index: usize) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::Outline, "outline")?;
        if index >= self.pages.len() {
            return Err(SessionError::PageOutOfRange(index));
        }
        self.pages.remove(index);
        self.renumber_pages();
        Ok(())
    }

    // --- Character stage ---

    /// Commits the extracted roster and page mapping and advances to
    /// `CharacterCreation`. Pages absent from the mapping keep an empty
    /// character list; names the roster does not contain are dropped.
    pub fn apply_character_analysis(
        &mut self,
        analysis: CharacterAnalysis,
    ) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::Outline, "outline")?;

        let mut roster: Vec<Character> = Vec::new();
        for character in analysis.characters {
            if !roster.iter().any(|c| c.name == character.name) {
                roster.push(character);
            }
        }

        for mapping in &analysis.pages {
            if let Some(page) = self.pages.iter_mut().find(|p| p.page == mapping.page) {
                page.characters = mapping
                    .characters
                    .iter()
                    .filter(|name| roster.iter().any(|c| &c.name == *name))
                    .cloned()
                    .collect();
            }
        }

        self.characters = roster;
        self.stage = WizardStage::CharacterCreation;
        Ok(())
    }

    pub fn set_character_description(
        &mut self,
        name: &str,
        description: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::CharacterCreation, "character_creation")?;
        let character = self.character_mut(name)?;
        character.description = description.into();
        Ok(())
    }

    /// Attaches a portrait, generated or uploaded. Raw bytes and declared
    /// media type are stored as-is; no re-encoding.
    pub fn attach_portrait(&mut self, name: &str, image: StoredImage) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::CharacterCreation, "character_creation")?;
        let character = self.character_mut(name)?;
        character.portrait = Some(image);
        Ok(())
    }

    /// True when every roster entry has a portrait. An empty roster is
    /// vacuously ready.
    pub fn characters_ready(&self) -> bool {
        self.characters.iter().all(|c| c.portrait.is_some())
    }

    /// Locks the roster and starts illustration with the cursor at index 0.
    pub fn confirm_characters(&mut self) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::CharacterCreation, "character_creation")?;
        if !self.characters_ready() {
            return Err(SessionError::CharactersNotReady);
        }
        self.current_page_index = 0;
        self.stage = WizardStage::CreatingPages;
        Ok(())
    }

    // --- Illustration stage ---

    /// Starts (or restarts) illustration of the page at the cursor.
    /// Invalidates any pending image and returns the generation token the
    /// completed call must present.
    pub fn begin_illustration(&mut self) -> Result<u64, SessionError> {
        self.expect_stage(WizardStage::CreatingPages, "creating_pages")?;
        self.illustration_generation += 1;
        self.pending_illustration = None;
        Ok(self.illustration_generation)
    }

    /// The text of the cursor page plus the portraits of the characters
    /// named on it. Characters without a stored portrait are excluded even
    /// if listed.
    pub fn illustration_request(&self) -> Result<(String, Vec<StoredImage>), SessionError> {
        self.expect_stage(WizardStage::CreatingPages, "creating_pages")?;
        let page = self
            .pages
            .get(self.current_page_index)
            .ok_or(SessionError::PageOutOfRange(self.current_page_index))?;
        let references = self
            .characters
            .iter()
            .filter(|c| page.characters.contains(&c.name))
            .filter_map(|c| c.portrait.clone())
            .collect();
        Ok((page.text.clone(), references))
    }

    /// Accepts a generated illustration for approval, unless a newer
    /// request has superseded it.
    pub fn complete_illustration(
        &mut self,
        token: u64,
        image: StoredImage,
    ) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::CreatingPages, "creating_pages")?;
        if token != self.illustration_generation {
            return Err(SessionError::StaleGeneration);
        }
        self.pending_illustration = Some(image);
        Ok(())
    }

    /// Commits the pending illustration to the cursor page and advances.
    /// Approving the last page finishes the book.
    pub fn approve_page(&mut self) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::CreatingPages, "creating_pages")?;
        let image = self
            .pending_illustration
            .take()
            .ok_or(SessionError::NoPendingIllustration)?;
        let index = self.current_page_index;
        let page = self
            .pages
            .get_mut(index)
            .ok_or(SessionError::PageOutOfRange(index))?;
        page.illustration = Some(image);

        if index + 1 < self.pages.len() {
            self.current_page_index = index + 1;
        } else {
            self.stage = WizardStage::Finished;
        }
        Ok(())
    }

    // --- Finished stage ---

    /// The indices and texts of pages still lacking narration. Pages that
    /// already carry audio are skipped, so a second audiobook run over a
    /// fully narrated book issues zero calls.
    pub fn pages_without_narration(&self) -> Result<Vec<(usize, String)>, SessionError> {
        self.expect_stage(WizardStage::Finished, "finished")?;
        Ok(self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.narration.is_none())
            .map(|(i, p)| (i, p.text.clone()))
            .collect())
    }

    pub fn attach_narration(&mut self, index: usize, clip: AudioClip) -> Result<(), SessionError> {
        self.expect_stage(WizardStage::Finished, "finished")?;
        let page = self
            .pages
            .get_mut(index)
            .ok_or(SessionError::PageOutOfRange(index))?;
        page.narration = Some(clip);
        Ok(())
    }

    // --- Helpers ---

    fn expect_stage(&self, stage: WizardStage, name: &'static str) -> Result<(), SessionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(SessionError::WrongStage {
                expected: name,
                found: self.stage,
            })
        }
    }

    fn character_mut(&mut self, name: &str) -> Result<&mut Character, SessionError> {
        self.characters
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| SessionError::UnknownCharacter(name.to_string()))
    }

    fn renumber_pages(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.page = i as u32 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PageCharacters;

    fn stub(page: Option<u32>, text: &str) -> PageStub {
        PageStub {
            page,
            text: text.to_string(),
        }
    }

    fn image(tag: u8) -> StoredImage {
        StoredImage::new(vec![tag; 4], "image/png")
    }

    fn session_with_outline(count: usize) -> StorySession {
        let mut session = StorySession::new("a premise", "A Title");
        let stubs = (1..=count)
            .map(|n| stub(Some(n as u32), &format!("page {n}")))
            .collect();
        session.apply_outline(stubs).unwrap();
        session
    }

    /// Drives a session through character extraction with a single
    /// character appearing on every page.
    fn session_in_creating_pages(count: usize) -> StorySession {
        let mut session = session_with_outline(count);
        let analysis = CharacterAnalysis {
            characters: vec![Character::new("Ember", "a small dragon")],
            pages: (1..=count as u32)
                .map(|page| PageCharacters {
                    page,
                    characters: vec!["Ember".to_string()],
                })
                .collect(),
        };
        session.apply_character_analysis(analysis).unwrap();
        session.attach_portrait("Ember", image(9)).unwrap();
        session.confirm_characters().unwrap();
        session
    }

    #[test]
    fn outline_entries_without_page_numbers_are_assigned_sequentially() {
        let mut session = StorySession::new("p", "t");
        session
            .apply_outline(vec![
                stub(None, "one"),
                stub(None, "two"),
                stub(Some(7), "three"),
            ])
            .unwrap();
        let numbers: Vec<u32> = session.pages().iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(session.stage(), WizardStage::Outline);
    }

    #[test]
    fn empty_outline_is_rejected_and_stage_stays_prompt() {
        let mut session = StorySession::new("p", "t");
        assert!(matches!(
            session.apply_outline(vec![]),
            Err(SessionError::EmptyOutline)
        ));
        assert_eq!(session.stage(), WizardStage::Prompt);
    }

    #[test]
    fn removing_a_page_renumbers_and_preserves_order() {
        let mut session = session_with_outline(5);
        session.remove_page(2).unwrap();
        assert_eq!(session.pages().len(), 4);
        let numbers: Vec<u32> = session.pages().iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        let texts: Vec<&str> = session.pages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["page 1", "page 2", "page 4", "page 5"]);
    }

    #[test]
    fn removing_out_of_range_page_fails() {
        let mut session = session_with_outline(3);
        assert!(matches!(
            session.remove_page(3),
            Err(SessionError::PageOutOfRange(3))
        ));
    }

    #[test]
    fn page_deletion_is_not_allowed_once_illustration_started() {
        let mut session = session_in_creating_pages(3);
        assert!(matches!(
            session.remove_page(0),
            Err(SessionError::WrongStage { .. })
        ));
    }

    #[test]
    fn character_mapping_merges_by_page_number_and_drops_unknown_names() {
        let mut session = session_with_outline(3);
        let analysis = CharacterAnalysis {
            characters: vec![Character::new("Ember", "a dragon")],
            pages: vec![
                PageCharacters {
                    page: 2,
                    characters: vec!["Ember".to_string(), "Nobody".to_string()],
                },
                // Page 9 does not exist; the mapping entry is ignored.
                PageCharacters {
                    page: 9,
                    characters: vec!["Ember".to_string()],
                },
            ],
        };
        session.apply_character_analysis(analysis).unwrap();
        assert_eq!(session.stage(), WizardStage::CharacterCreation);
        assert!(session.pages()[0].characters.is_empty());
        assert_eq!(session.pages()[1].characters, vec!["Ember".to_string()]);
        assert!(session.pages()[2].characters.is_empty());
    }

    #[test]
    fn duplicate_roster_names_keep_the_first_entry() {
        let mut session = session_with_outline(2);
        let analysis = CharacterAnalysis {
            characters: vec![
                Character::new("Ember", "first"),
                Character::new("Ember", "second"),
            ],
            pages: vec![],
        };
        session.apply_character_analysis(analysis).unwrap();
        assert_eq!(session.characters().len(), 1);
        assert_eq!(session.characters()[0].description, "first");
    }

    #[test]
    fn empty_roster_is_vacuously_ready() {
        let mut session = session_with_outline(2);
        session
            .apply_character_analysis(CharacterAnalysis {
                characters: vec![],
                pages: vec![],
            })
            .unwrap();
        assert!(session.characters_ready());
        session.confirm_characters().unwrap();
        assert_eq!(session.stage(), WizardStage::CreatingPages);
    }

    #[test]
    fn roster_with_missing_portrait_is_not_ready() {
        let mut session = session_with_outline(2);
        session
            .apply_character_analysis(CharacterAnalysis {
                characters: vec![
                    Character::new("Ember", "a dragon"),
                    Character::new("Pip", "a mouse"),
                ],
                pages: vec![],
            })
            .unwrap();
        session.attach_portrait("Ember", image(1)).unwrap();
        assert!(!session.characters_ready());
        assert!(matches!(
            session.confirm_characters(),
            Err(SessionError::CharactersNotReady)
        ));
    }

    #[test]
    fn attaching_portrait_to_unknown_character_fails() {
        let mut session = session_with_outline(2);
        session
            .apply_character_analysis(CharacterAnalysis {
                characters: vec![Character::new("Ember", "a dragon")],
                pages: vec![],
            })
            .unwrap();
        assert!(matches!(
            session.attach_portrait("Ghost", image(1)),
            Err(SessionError::UnknownCharacter(_))
        ));
    }

    #[test]
    fn approving_an_earlier_page_advances_the_cursor_by_one() {
        let mut session = session_in_creating_pages(3);
        let token = session.begin_illustration().unwrap();
        session.complete_illustration(token, image(1)).unwrap();
        session.approve_page().unwrap();
        assert_eq!(session.current_page_index(), 1);
        assert_eq!(session.stage(), WizardStage::CreatingPages);
    }

    #[test]
    fn approving_the_last_page_finishes_the_book() {
        let mut session = session_in_creating_pages(2);
        for _ in 0..2 {
            let token = session.begin_illustration().unwrap();
            session.complete_illustration(token, image(1)).unwrap();
            session.approve_page().unwrap();
        }
        assert_eq!(session.stage(), WizardStage::Finished);
        assert!(session.pages().iter().all(|p| p.illustration.is_some()));
    }

    #[test]
    fn approval_without_a_pending_illustration_fails() {
        let mut session = session_in_creating_pages(2);
        assert!(matches!(
            session.approve_page(),
            Err(SessionError::NoPendingIllustration)
        ));
    }

    #[test]
    fn stale_illustration_results_are_discarded() {
        let mut session = session_in_creating_pages(2);
        let first = session.begin_illustration().unwrap();
        // The user clicked "try again" before the first call resolved.
        let second = session.begin_illustration().unwrap();
        assert!(matches!(
            session.complete_illustration(first, image(1)),
            Err(SessionError::StaleGeneration)
        ));
        assert!(session.pending_illustration().is_none());
        session.complete_illustration(second, image(2)).unwrap();
        assert_eq!(session.pending_illustration(), Some(&image(2)));
    }

    #[test]
    fn regeneration_invalidates_the_pending_image() {
        let mut session = session_in_creating_pages(2);
        let token = session.begin_illustration().unwrap();
        session.complete_illustration(token, image(1)).unwrap();
        session.begin_illustration().unwrap();
        assert!(session.pending_illustration().is_none());
    }

    #[test]
    fn illustration_request_only_includes_characters_named_on_the_page() {
        let mut session = session_with_outline(2);
        session
            .apply_character_analysis(CharacterAnalysis {
                characters: vec![
                    Character::new("Ember", "a dragon"),
                    Character::new("Pip", "a mouse"),
                    Character::new("Willow", "an owl"),
                ],
                pages: vec![
                    PageCharacters {
                        page: 1,
                        characters: vec!["Ember".to_string(), "Pip".to_string()],
                    },
                    PageCharacters {
                        page: 2,
                        characters: vec!["Willow".to_string()],
                    },
                ],
            })
            .unwrap();
        session.attach_portrait("Ember", image(1)).unwrap();
        session.attach_portrait("Pip", image(2)).unwrap();
        session.attach_portrait("Willow", image(3)).unwrap();
        session.confirm_characters().unwrap();

        // Cursor is on page 1: Willow is in the roster but not on the page.
        let (_, references) = session.illustration_request().unwrap();
        assert_eq!(references, vec![image(1), image(2)]);
    }

    #[test]
    fn narration_skips_pages_that_already_have_audio() {
        let mut session = session_in_creating_pages(3);
        for _ in 0..3 {
            let token = session.begin_illustration().unwrap();
            session.complete_illustration(token, image(1)).unwrap();
            session.approve_page().unwrap();
        }
        session
            .attach_narration(1, AudioClip::mpeg(vec![0, 1]))
            .unwrap();
        let remaining = session.pages_without_narration().unwrap();
        let indices: Vec<usize> = remaining.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);

        for (i, _) in remaining {
            session.attach_narration(i, AudioClip::mpeg(vec![2])).unwrap();
        }
        assert!(session.pages_without_narration().unwrap().is_empty());
    }

    #[test]
    fn has_narration_flips_once_any_page_carries_audio() {
        let mut session = session_in_creating_pages(2);
        for _ in 0..2 {
            let token = session.begin_illustration().unwrap();
            session.complete_illustration(token, image(1)).unwrap();
            session.approve_page().unwrap();
        }
        assert!(!session.has_narration());
        session
            .attach_narration(0, AudioClip::mpeg(vec![1]))
            .unwrap();
        assert!(session.has_narration());
    }

    #[test]
    fn narration_is_only_available_once_finished() {
        let session = session_in_creating_pages(2);
        assert!(matches!(
            session.pages_without_narration(),
            Err(SessionError::WrongStage { .. })
        ));
    }

    #[test]
    fn shy_dragon_end_to_end() {
        // Premise "A shy dragon who is afraid of fire" → 6 pages → one
        // character → portrait upload → illustrate and approve each page.
        let mut session = StorySession::new("A shy dragon who is afraid of fire", "Ember");
        session
            .apply_outline(
                (0..6)
                    .map(|i| stub(None, &format!("scene {i}")))
                    .collect(),
            )
            .unwrap();
        session
            .apply_character_analysis(CharacterAnalysis {
                characters: vec![Character::new("Ember the Dragon", "a small green dragon")],
                pages: (1..=6)
                    .map(|page| PageCharacters {
                        page,
                        characters: vec!["Ember the Dragon".to_string()],
                    })
                    .collect(),
            })
            .unwrap();
        session
            .attach_portrait("Ember the Dragon", image(7))
            .unwrap();
        session.confirm_characters().unwrap();

        for expected_index in 0..6 {
            assert_eq!(session.current_page_index(), expected_index);
            let (text, references) = session.illustration_request().unwrap();
            assert_eq!(text, format!("scene {expected_index}"));
            assert_eq!(references.len(), 1);
            let token = session.begin_illustration().unwrap();
            session
                .complete_illustration(token, image(expected_index as u8))
                .unwrap();
            session.approve_page().unwrap();
        }

        assert_eq!(session.stage(), WizardStage::Finished);
        assert_eq!(
            session
                .pages()
                .iter()
                .filter(|p| p.illustration.is_some())
                .count(),
            6
        );
    }
}
