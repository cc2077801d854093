use crate::model::{Card, CardId, Note};
use crate::schema::{CardView, RenderedCard};
use crate::{cardgen, Error, LibraryError, NotFoundKind};
use sqlx::SqlitePool;

pub async fn get_card(pool: &SqlitePool, id: CardId) -> Result<Card, Error> {
    sqlx::query_as("SELECT * FROM cards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Library(LibraryError::NotFound(NotFoundKind::Card(id))))
}

pub async fn owning_note(pool: &SqlitePool, card: &Card) -> Result<Note, Error> {
    super::note::get_note(pool, card.note_id).await
}

pub fn to_view(card: &Card, deck_id: crate::model::DeckId) -> CardView {
    CardView {
        id: card.id,
        note_id: card.note_id,
        deck_id,
        template: card.template.clone(),
        state: card.state,
        due: card.due,
        ivl: card.ivl,
        ease: card.ease,
        reps: card.reps,
        lapses: card.lapses,
    }
}

/// `card_info` (`spec.md` supplemented features): the card's scheduling
/// state plus its rendered question/answer, grounded on the teacher's
/// `api/card.rs::get_card` response shape.
pub async fn render(pool: &SqlitePool, id: CardId) -> Result<RenderedCard, Error> {
    let card = get_card(pool, id).await?;
    let note = owning_note(pool, &card).await?;
    let (question, answer) = cardgen::render(&note, &card);
    Ok(RenderedCard {
        card: to_view(&card, note.deck_id),
        question,
        answer,
    })
}
