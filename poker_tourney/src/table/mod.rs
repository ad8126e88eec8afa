//! A tournament table: seats, the dealer button, the table state machine
//! and the hand currently in play.
//!
//! Seats hold player ids only. Stacks and per-hand flags live in the
//! tournament [`Roster`], which is passed in wherever a table needs them.

pub mod state;

pub use state::TableState;

use crate::game::{Blinds, Card, Deck, Hand, HandError, PlayerId, Roster, SeatIndex};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("seat {0} does not exist")]
    InvalidSeat(SeatIndex),
    #[error("seat {0} is already taken")]
    SeatOccupied(SeatIndex),
    #[error("seat {0} is empty")]
    SeatEmpty(SeatIndex),
    #[error("table is full")]
    TableFull,
    #[error("player {0} is already seated")]
    AlreadySeated(PlayerId),
    #[error("player {0} is not seated at this table")]
    PlayerNotSeated(PlayerId),
    #[error("no hand in progress")]
    NoHand,
    #[error("not enough players to deal")]
    NotEnoughPlayers,
    #[error(transparent)]
    Hand(#[from] HandError),
}

pub type TableResult<T> = Result<T, TableError>;

#[derive(Clone, Debug)]
pub struct Table {
    id: usize,
    seats: Vec<Option<PlayerId>>,
    button: Option<SeatIndex>,
    state: TableState,
    previous_state: TableState,
    pending_state: Option<TableState>,
    hand_num: u64,
    level: usize,
    auto_deal: bool,
    hand: Option<Hand>,
}

impl Table {
    pub fn new(id: usize, num_seats: usize) -> Self {
        Self {
            id,
            seats: vec![None; num_seats],
            button: None,
            state: TableState::DealForButton,
            previous_state: TableState::None,
            pending_state: None,
            hand_num: 0,
            level: 0,
            auto_deal: true,
            hand: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn num_seats(&self) -> usize {
        self.seats.len()
    }

    /// Seats a player in the first empty seat.
    pub fn add_player(&mut self, player_id: PlayerId) -> TableResult<SeatIndex> {
        let seat = self
            .seats
            .iter()
            .position(Option::is_none)
            .ok_or(TableError::TableFull)?;
        self.add_player_at(player_id, seat)?;
        Ok(seat)
    }

    pub fn add_player_at(&mut self, player_id: PlayerId, seat: SeatIndex) -> TableResult<()> {
        if self.seat_of(player_id).is_some() {
            return Err(TableError::AlreadySeated(player_id));
        }
        match self.seats.get_mut(seat) {
            None => Err(TableError::InvalidSeat(seat)),
            Some(Some(_)) => Err(TableError::SeatOccupied(seat)),
            Some(slot) => {
                *slot = Some(player_id);
                Ok(())
            }
        }
    }

    /// Frees a player's seat. If the player held the button, the button
    /// falls back to the previous occupied seat so the next advance lands
    /// on the correct player.
    pub fn remove_player(&mut self, player_id: PlayerId) -> TableResult<SeatIndex> {
        let seat = self
            .seat_of(player_id)
            .ok_or(TableError::PlayerNotSeated(player_id))?;
        self.seats[seat] = None;
        if self.button == Some(seat) {
            self.button = self.prev_seat(seat);
        }
        Ok(seat)
    }

    #[must_use]
    pub fn seat_of(&self, player_id: PlayerId) -> Option<SeatIndex> {
        self.seats.iter().position(|s| *s == Some(player_id))
    }

    #[must_use]
    pub fn player_at(&self, seat: SeatIndex) -> Option<PlayerId> {
        self.seats.get(seat).copied().flatten()
    }

    /// Seated players in seat order.
    #[must_use]
    pub fn players(&self) -> Vec<PlayerId> {
        self.seats.iter().flatten().copied().collect()
    }

    /// `(seat, player)` pairs for occupied seats.
    pub fn occupied_seats(&self) -> impl Iterator<Item = (SeatIndex, PlayerId)> + '_ {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(seat, p)| p.map(|id| (seat, id)))
    }

    #[must_use]
    pub fn num_occupied(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn num_with_chips(&self, roster: &Roster) -> usize {
        self.players()
            .into_iter()
            .filter(|id| roster.chips_of(*id) > 0)
            .count()
    }

    /// Next occupied seat clockwise from `seat`, wrapping, never `seat`
    /// itself unless it is the only occupied one.
    #[must_use]
    pub fn next_seat(&self, seat: SeatIndex) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n)
            .map(|offset| (seat + offset) % n)
            .find(|s| self.seats[*s].is_some())
    }

    fn prev_seat(&self, seat: SeatIndex) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n)
            .map(|offset| (seat + n - offset) % n)
            .find(|s| self.seats[*s].is_some())
    }

    #[must_use]
    pub fn next_seat_after_button(&self) -> Option<SeatIndex> {
        self.button.and_then(|b| self.next_seat(b))
    }

    #[must_use]
    pub fn button(&self) -> Option<SeatIndex> {
        self.button
    }

    pub fn set_button_seat(&mut self, seat: SeatIndex) -> TableResult<()> {
        match self.seats.get(seat) {
            None => Err(TableError::InvalidSeat(seat)),
            Some(None) => Err(TableError::SeatEmpty(seat)),
            Some(Some(_)) => {
                self.button = Some(seat);
                Ok(())
            }
        }
    }

    /// Deals one card to every occupied seat; the highest card takes the
    /// button, suits breaking ties.
    pub fn set_button<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<SeatIndex> {
        let mut deck = Deck::shuffled(rng);
        let mut best: Option<(Card, SeatIndex)> = None;
        for (seat, _) in self.occupied_seats().collect::<Vec<_>>() {
            let Some(card) = deck.deal_card() else {
                break;
            };
            if best.is_none_or(|(high, _)| card > high) {
                best = Some((card, seat));
            }
        }
        self.button = best.map(|(_, seat)| seat);
        self.button
    }

    /// Moves the button clockwise to the next occupied seat.
    pub fn advance_button(&mut self) -> Option<SeatIndex> {
        self.button = match self.button {
            Some(seat) => self.next_seat(seat),
            None => self.seats.iter().position(Option::is_some),
        };
        self.button
    }

    #[must_use]
    pub fn state(&self) -> TableState {
        self.state
    }

    #[must_use]
    pub fn previous_state(&self) -> TableState {
        self.previous_state
    }

    pub fn set_state(&mut self, state: TableState) {
        if self.state != state {
            self.previous_state = self.state;
            self.state = state;
        }
    }

    #[must_use]
    pub fn pending_state(&self) -> Option<TableState> {
        self.pending_state
    }

    pub fn set_pending_state(&mut self, state: Option<TableState>) {
        self.pending_state = state;
    }

    #[must_use]
    pub fn hand_num(&self) -> u64 {
        self.hand_num
    }

    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    #[must_use]
    pub fn is_auto_deal(&self) -> bool {
        self.auto_deal
    }

    pub fn set_auto_deal(&mut self, auto_deal: bool) {
        self.auto_deal = auto_deal;
    }

    #[must_use]
    pub fn hand(&self) -> Option<&Hand> {
        self.hand.as_ref()
    }

    pub fn hand_mut(&mut self) -> Option<&mut Hand> {
        self.hand.as_mut()
    }

    /// Discards the finished hand.
    pub fn clear_hand(&mut self) -> Option<Hand> {
        self.hand.take()
    }

    /// True while a dealt hand has not been paid out.
    #[must_use]
    pub fn has_active_hand(&self) -> bool {
        self.hand.as_ref().is_some_and(|h| !h.is_resolved())
    }

    /// Advances the button (except on the first hand, where the button was
    /// just dealt), bumps the hand counter and deals a new hand to every
    /// seated player holding chips.
    pub fn start_new_hand(&mut self, roster: &mut Roster, blinds: Blinds, deck: Deck) -> TableResult<&Hand> {
        if self.has_active_hand() {
            return Err(TableError::Hand(HandError::HandComplete));
        }
        if self.hand_num > 0 || self.button.is_none() {
            self.advance_button();
        }
        let button = self.button.ok_or(TableError::NotEnoughPlayers)?;

        let n = self.seats.len();
        let order: Vec<PlayerId> = (1..=n)
            .map(|offset| (button + offset) % n)
            .filter_map(|seat| self.seats[seat])
            .filter(|id| roster.chips_of(*id) > 0)
            .collect();

        let mut hand = Hand::new(self.hand_num + 1, order, blinds, deck)?;
        hand.deal(roster)?;
        self.hand_num += 1;
        Ok(self.hand.insert(hand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;
    use rand::{SeedableRng, rngs::StdRng};

    fn seated(ids: &[PlayerId], seats: usize) -> (Table, Roster) {
        let mut table = Table::new(0, seats);
        let mut roster = Roster::new();
        for id in ids {
            table.add_player(*id).unwrap();
            roster.insert(Player::new(*id, format!("p{id}"), false, 1000));
        }
        (table, roster)
    }

    fn blinds() -> Blinds {
        Blinds {
            small_blind: 10,
            big_blind: 20,
            ante: 0,
        }
    }

    #[test]
    fn test_seating() {
        let (mut table, _) = seated(&[1, 2], 3);
        assert_eq!(table.add_player(3), Ok(2));
        assert_eq!(table.add_player(4), Err(TableError::TableFull));
        assert_eq!(table.add_player(1), Err(TableError::AlreadySeated(1)));
        assert_eq!(table.remove_player(2), Ok(1));
        assert_eq!(table.add_player_at(5, 1), Ok(()));
        assert_eq!(table.add_player_at(6, 1), Err(TableError::SeatOccupied(1)));
        assert_eq!(table.add_player_at(6, 9), Err(TableError::InvalidSeat(9)));
        assert_eq!(table.players(), vec![1, 5, 3]);
    }

    #[test]
    fn test_next_seat_skips_empty_and_wraps() {
        let mut table = Table::new(0, 6);
        table.add_player_at(10, 1).unwrap();
        table.add_player_at(11, 4).unwrap();
        assert_eq!(table.next_seat(1), Some(4));
        assert_eq!(table.next_seat(4), Some(1));
        assert_eq!(table.next_seat(5), Some(1));
    }

    #[test]
    fn test_advance_button_wraps() {
        let (mut table, _) = seated(&[1, 2, 3], 5);
        table.set_button_seat(2).unwrap();
        assert_eq!(table.advance_button(), Some(0));
        assert_eq!(table.next_seat_after_button(), Some(1));
    }

    #[test]
    fn test_set_button_lands_on_occupied_seat() {
        let mut table = Table::new(0, 9);
        table.add_player_at(1, 2).unwrap();
        table.add_player_at(2, 7).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let seat = table.set_button(&mut rng).unwrap();
        assert!(seat == 2 || seat == 7);
    }

    #[test]
    fn test_removing_button_player_keeps_rotation() {
        let (mut table, _) = seated(&[1, 2, 3], 3);
        table.set_button_seat(1).unwrap();
        table.remove_player(2).unwrap();
        assert_eq!(table.button(), Some(0));
        assert_eq!(table.advance_button(), Some(2));
    }

    #[test]
    fn test_state_tracks_previous() {
        let mut table = Table::new(0, 2);
        table.set_state(TableState::Begin);
        table.set_state(TableState::StartHand);
        assert_eq!(table.previous_state(), TableState::Begin);
        table.set_state(TableState::StartHand);
        assert_eq!(table.previous_state(), TableState::Begin);
    }

    #[test]
    fn test_start_new_hand_rotates_button() {
        let (mut table, mut roster) = seated(&[1, 2, 3], 3);
        table.set_button_seat(0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let hand = table
            .start_new_hand(&mut roster, blinds(), Deck::shuffled(&mut rng))
            .unwrap();
        assert_eq!(hand.button(), 1);
        assert_eq!(hand.order(), &[2, 3, 1]);
        assert_eq!(table.hand_num(), 1);

        // Finishing the hand lets the next one start one seat further on.
        let hand = table.hand_mut().unwrap();
        while let Some(id) = hand.current_player() {
            hand.apply_player_action(&mut roster, id, crate::game::PlayerAction::fold())
                .unwrap();
        }
        hand.resolve(&mut roster).unwrap();
        let hand = table
            .start_new_hand(&mut roster, blinds(), Deck::shuffled(&mut rng))
            .unwrap();
        assert_eq!(hand.button(), 2);
        assert_eq!(table.button(), Some(1));
    }

    #[test]
    fn test_broke_players_are_not_dealt_in() {
        let (mut table, mut roster) = seated(&[1, 2, 3], 3);
        roster.get_mut(2).unwrap().chips = 0;
        table.set_button_seat(0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let hand = table
            .start_new_hand(&mut roster, blinds(), Deck::shuffled(&mut rng))
            .unwrap();
        assert_eq!(hand.order(), &[3, 1]);
    }
}
